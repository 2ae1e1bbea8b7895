// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Expected hub version, read once from the chart descriptor.

use std::path::Path;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde_json::Value;

use crate::error::HubError;

const APP_VERSION_KEY: &str = "appVersion";

/// Reads `appVersion` from a Helm `Chart.yaml`.
///
/// Unquoted versions such as `1.1` parse as YAML numbers and are rendered back
/// to their textual form.
pub fn read_app_version(chart_path: &Path) -> Result<String, HubError> {
    if !chart_path.is_file() {
        return Err(HubError::Version(format!(
            "chart descriptor {} does not exist",
            chart_path.display()
        )));
    }

    let value: Value = Figment::new()
        .merge(Yaml::file(chart_path))
        .extract_inner(APP_VERSION_KEY)
        .map_err(|e| HubError::Version(format!("{}: {e}", chart_path.display())))?;

    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(HubError::Version(format!(
            "{}: {APP_VERSION_KEY} must be a non-empty string, got {other}",
            chart_path.display()
        ))),
    }
}
