// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end checks for a notebook hub deployment.
//!
//! The hub starts and stops user servers asynchronously. The [`lifecycle`]
//! waits observe those transitions by polling the REST API ([`poll`]), and the
//! [`scenario`] module composes them into checks that always clean up after
//! themselves.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod log_level;
pub mod model;
pub mod poll;
pub mod probe;
pub mod scenario;
pub mod version;
