use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    parse_listen_address, parse_timeout, ExporterConfig, DEFAULT_LISTEN_ADDRESS,
    DEFAULT_SCRAPE_URL, DEFAULT_TELEMETRY_PATH, DEFAULT_TIMEOUT,
};
use crate::exporter::Exporter;
use crate::providers::BuildkiteProvider;
use crate::web::WebService;

#[derive(Parser)]
#[command(name = "buildkite-exporter")]
#[command(author, version, about = "Prometheus exporter for Buildkite build states", long_about = None)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry (host:port or :port)
    #[arg(
        long = "web.listen-address",
        env = "LISTEN_ADDRESS",
        default_value = DEFAULT_LISTEN_ADDRESS,
        value_parser = parse_listen_address
    )]
    listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", env = "TELEMETRY_PATH", default_value = DEFAULT_TELEMETRY_PATH)]
    telemetry_path: String,

    /// GraphQL URL on which to scrape Buildkite
    #[arg(long = "buildkite.scrape-url", env = "BUILDKITE_SCRAPE_URL", default_value = DEFAULT_SCRAPE_URL)]
    scrape_url: String,

    /// Buildkite organization to scrape
    #[arg(long = "buildkite.organization", env = "BUILDKITE_ORGANIZATION")]
    organization: Option<String>,

    /// Buildkite GraphQL token
    #[arg(long = "buildkite.token", env = "BUILDKITE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Timeout for each request to Buildkite (e.g. 10s, 500ms, 1m; bare numbers are seconds)
    #[arg(
        long = "buildkite.timeout",
        env = "BUILDKITE_TIMEOUT",
        default_value = DEFAULT_TIMEOUT,
        value_parser = parse_timeout
    )]
    timeout: Duration,
}

impl Cli {
    pub fn config(&self) -> crate::error::Result<ExporterConfig> {
        ExporterConfig::new(
            &self.listen_address,
            &self.telemetry_path,
            &self.scrape_url,
            self.organization.as_deref(),
            self.token.as_deref(),
            self.timeout,
        )
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.config()?;
        info!(
            "Exporting build states for organization '{}' from {}",
            config.organization, config.scrape_url
        );

        let provider = BuildkiteProvider::new(
            config.scrape_url.clone(),
            config.organization.clone(),
            config.token.clone(),
            config.timeout,
        )?;
        let exporter = Arc::new(Exporter::new(provider)?);

        let service = WebService::bind_to_address(
            &config.listen_address,
            exporter,
            config.telemetry_path.clone(),
        )
        .await?;
        info!(
            "Listening on {}, metrics at {}",
            service.bind_addr()?,
            config.telemetry_path
        );

        service
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {e}");
                    std::future::pending::<()>().await;
                }
            })
            .await
            .context("metrics server failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "buildkite-exporter",
            "--buildkite.organization",
            "acme",
            "--buildkite.token",
            "bkua_token",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:9101");
        assert_eq!(config.telemetry_path, "/metrics");
        assert_eq!(config.scrape_url.as_str(), "https://graphql.buildkite.com/v1");
        assert_eq!(config.timeout.as_secs(), 10);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "buildkite-exporter",
            "--web.listen-address",
            "127.0.0.1:9200",
            "--web.telemetry-path",
            "/buildkite",
            "--buildkite.scrape-url",
            "http://localhost:4000/graphql",
            "--buildkite.organization",
            "acme",
            "--buildkite.token",
            "bkua_token",
            "--buildkite.timeout",
            "3",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9200");
        assert_eq!(config.telemetry_path, "/buildkite");
        assert_eq!(config.scrape_url.as_str(), "http://localhost:4000/graphql");
        assert_eq!(config.organization, "acme");
        assert_eq!(config.timeout.as_secs(), 3);
    }

    #[test]
    fn test_go_style_timeout_and_host_name_address() {
        let cli = Cli::try_parse_from([
            "buildkite-exporter",
            "--web.listen-address",
            "localhost:9101",
            "--buildkite.timeout",
            "10s",
            "--buildkite.organization",
            "acme",
            "--buildkite.token",
            "bkua_token",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.listen_address, "localhost:9101");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_colon_telemetry_path_is_a_config_error() {
        let cli = Cli::try_parse_from([
            "buildkite-exporter",
            "--web.telemetry-path",
            "/:metrics",
            "--buildkite.organization",
            "acme",
            "--buildkite.token",
            "bkua_token",
        ])
        .unwrap();

        assert!(cli.config().is_err());
    }

    #[test]
    fn test_bad_listen_address_fails_parsing() {
        let result = Cli::try_parse_from([
            "buildkite-exporter",
            "--web.listen-address",
            "nowhere",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        let cli = Cli::try_parse_from([
            "buildkite-exporter",
            "--buildkite.organization",
            "acme",
            "--buildkite.token",
            "",
        ])
        .unwrap();

        assert!(cli.config().is_err());
    }
}
