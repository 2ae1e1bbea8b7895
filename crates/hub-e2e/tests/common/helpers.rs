// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::time::Duration;

use hub_e2e::config::Config;
use hub_e2e::probe::ProbeStatus;
use hub_e2e::scenario::Harness;

use super::mocks::{FakeHub, FakeProbe};

pub const ALLOWED_URL: &str = "http://jupyter.org";
pub const BLOCKED_URL: &str = "http://mybinder.org";

/// Config with short waits, suitable for a paused clock.
pub fn test_config() -> Config {
    Config {
        token: "test-token".to_string(),
        test_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(500),
        allowed_url: ALLOWED_URL.to_string(),
        blocked_url: BLOCKED_URL.to_string(),
        ..Config::default()
    }
}

/// Probe enforcing the expected egress policy.
pub fn enforcing_probe() -> FakeProbe {
    FakeProbe::with(&[
        (ALLOWED_URL, ProbeStatus::Reachable),
        (BLOCKED_URL, ProbeStatus::Blocked(Some(1))),
    ])
}

pub fn harness(hub: &FakeHub, probe: &FakeProbe) -> Harness {
    Harness::new(Box::new(hub.clone()), Box::new(probe.clone()), test_config())
}
