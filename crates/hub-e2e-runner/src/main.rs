// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, path::PathBuf, process::ExitCode};

use anyhow::Context;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use hub_e2e::{
    client::HubClient,
    config::{self, Config, ConfigBuilder, EnvConfigSource, YamlConfigSource},
    probe::KubectlProbe,
    scenario::Harness,
    version::read_app_version,
};

const CONFIG_PATH_VAR: &str = "HUB_E2E_CONFIG";

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = load_config();

    if let Err(e) = init_logging(&config) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    match run(config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Hub end-to-end suite could not start: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `HUB_E2E_CONFIG` may name either the YAML file itself or the directory
/// holding `hub-e2e.yaml`; without it the working directory is used.
fn load_config() -> Config {
    let path = match env::var(CONFIG_PATH_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from("."),
    };
    let path = if path.is_dir() {
        path.join(config::CONFIG_FILE_NAME)
    } else {
        path
    };

    ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource { path }))
        .add_source(Box::new(EnvConfigSource))
        .build()
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,{}",
        config.log_level.as_directive()
    );

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).context("could not parse log level in configuration")?,
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

/// Returns whether every scenario passed.
async fn run(config: Config) -> anyhow::Result<bool> {
    config.validate().context("invalid configuration")?;

    let expected_version = read_app_version(&config.chart_path)
        .context("could not determine the expected hub version")?;
    info!(
        hub_url = %config.hub_url,
        namespace = %config.namespace,
        expected_version = %expected_version,
        "Starting hub end-to-end suite"
    );

    let client = HubClient::new(&config.hub_url, &config.token, config.client_options())
        .context("could not build the hub client")?;
    debug!(
        api = client.base_url(),
        public = client.public_url(),
        "hub client ready"
    );
    let probe = KubectlProbe::new(&config.namespace, config.probe_timeout);
    let harness = Harness::new(Box::new(client), Box::new(probe), config);

    let report = harness.run_suite(&expected_version).await;
    let failed = report.failures().count();
    if failed == 0 {
        info!(scenarios = report.results.len(), "All scenarios passed");
    } else {
        for failure in report.failures() {
            if let Some(e) = &failure.error {
                error!(scenario = failure.name, "{e}");
            }
        }
        error!(
            failed,
            scenarios = report.results.len(),
            "Hub end-to-end suite failed"
        );
    }
    Ok(report.passed())
}
