use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{ExporterError, Result};

pub const DEFAULT_LISTEN_ADDRESS: &str = ":9101";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_SCRAPE_URL: &str = "https://graphql.buildkite.com/v1";
pub const DEFAULT_TIMEOUT: &str = "10s";

/// Validated exporter settings.
///
/// Built once at startup from the command line; everything after this point
/// can assume the values are usable.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// `host:port` the metrics endpoint listens on, resolved when binding
    pub listen_address: String,
    /// Path under which metrics are exposed (e.g. "/metrics")
    pub telemetry_path: String,
    /// Buildkite GraphQL endpoint
    pub scrape_url: Url,
    /// Buildkite organization slug
    pub organization: String,
    /// Buildkite GraphQL API token
    pub token: Token,
    /// Upper bound for each request sent to Buildkite
    pub timeout: Duration,
}

impl ExporterConfig {
    /// Validate raw settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the organization or token is missing, the scrape
    /// URL does not parse, the telemetry path is unusable or the timeout is zero.
    pub fn new(
        listen_address: &str,
        telemetry_path: &str,
        scrape_url: &str,
        organization: Option<&str>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let organization = organization
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or_else(|| {
                ExporterError::Config("--buildkite.organization is required".to_string())
            })?;

        let token = token
            .map(Token::from)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExporterError::Config("--buildkite.token is required".to_string()))?;

        let listen_address = parse_listen_address(listen_address).map_err(ExporterError::Config)?;

        let scrape_url = Url::parse(scrape_url)
            .map_err(|e| ExporterError::Config(format!("Invalid scrape URL '{scrape_url}': {e}")))?;

        validate_telemetry_path(telemetry_path)?;

        if timeout.is_zero() {
            return Err(ExporterError::Config(
                "--buildkite.timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            listen_address,
            telemetry_path: telemetry_path.to_string(),
            scrape_url,
            organization: organization.to_string(),
            token,
            timeout,
        })
    }
}

/// The path becomes an axum route, so it must be a static route that axum accepts.
fn validate_telemetry_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path == "/" {
        return Err(ExporterError::Config(format!(
            "Telemetry path '{path}' must start with '/' and must not be '/'"
        )));
    }
    if path.contains(['{', '}', '*']) || path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(ExporterError::Config(format!(
            "Telemetry path '{path}' must not contain route captures or wildcards"
        )));
    }
    Ok(())
}

/// Normalize a `host:port` listen address.
///
/// `:PORT` is shorthand for all interfaces. Host names are kept as given and
/// resolved when the listener binds.
pub fn parse_listen_address(value: &str) -> std::result::Result<String, String> {
    let address = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid listen address '{value}': expected host:port"))?;

    if host.is_empty() {
        return Err(format!("invalid listen address '{value}': missing host"));
    }
    port.parse::<u16>()
        .map_err(|e| format!("invalid listen address '{value}': bad port: {e}"))?;

    Ok(address)
}

/// Parse a timeout given as plain seconds (`10`) or with a unit (`10s`, `500ms`, `1m`).
pub fn parse_timeout(value: &str) -> std::result::Result<Duration, String> {
    let value = value.trim();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(digits_end);

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid timeout '{value}': expected e.g. 10s, 500ms or 1m"))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        _ => Err(format!(
            "invalid timeout '{value}': unit must be one of ms, s, m"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(organization: Option<&str>, token: Option<&str>) -> Result<ExporterConfig> {
        ExporterConfig::new(
            DEFAULT_LISTEN_ADDRESS,
            DEFAULT_TELEMETRY_PATH,
            DEFAULT_SCRAPE_URL,
            organization,
            token,
            parse_timeout(DEFAULT_TIMEOUT).unwrap(),
        )
    }

    fn config_with_path(telemetry_path: &str) -> Result<ExporterConfig> {
        ExporterConfig::new(
            DEFAULT_LISTEN_ADDRESS,
            telemetry_path,
            DEFAULT_SCRAPE_URL,
            Some("acme"),
            Some("bkua_token"),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_valid_config() {
        let config = config(Some("acme"), Some("bkua_token")).unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:9101");
        assert_eq!(config.telemetry_path, "/metrics");
        assert_eq!(config.scrape_url.as_str(), "https://graphql.buildkite.com/v1");
        assert_eq!(config.organization, "acme");
        assert_eq!(config.token.as_str(), "bkua_token");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_organization_is_rejected() {
        let err = config(None, Some("bkua_token")).unwrap_err();
        assert!(err.to_string().contains("--buildkite.organization"));

        let err = config(Some("  "), Some("bkua_token")).unwrap_err();
        assert!(err.to_string().contains("--buildkite.organization"));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = config(Some("acme"), None).unwrap_err();
        assert!(err.to_string().contains("--buildkite.token"));

        let err = config(Some("acme"), Some("")).unwrap_err();
        assert!(err.to_string().contains("--buildkite.token"));
    }

    #[test]
    fn test_invalid_scrape_url_is_rejected() {
        let result = ExporterConfig::new(
            DEFAULT_LISTEN_ADDRESS,
            DEFAULT_TELEMETRY_PATH,
            "not a url",
            Some("acme"),
            Some("bkua_token"),
            Duration::from_secs(10),
        );
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_telemetry_path_validation() {
        assert!(validate_telemetry_path("/metrics").is_ok());
        assert!(validate_telemetry_path("/buildkite/metrics").is_ok());
        assert!(validate_telemetry_path("/build:kite").is_ok());
        assert!(validate_telemetry_path("metrics").is_err());
        assert!(validate_telemetry_path("/").is_err());
        assert!(validate_telemetry_path("/{id}").is_err());
        assert!(validate_telemetry_path("/*rest").is_err());
    }

    #[test]
    fn test_colon_segment_in_telemetry_path_is_a_config_error() {
        assert!(matches!(
            config_with_path("/:metrics"),
            Err(ExporterError::Config(_))
        ));
        assert!(matches!(
            config_with_path("/buildkite/:id"),
            Err(ExporterError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = ExporterConfig::new(
            DEFAULT_LISTEN_ADDRESS,
            DEFAULT_TELEMETRY_PATH,
            DEFAULT_SCRAPE_URL,
            Some("acme"),
            Some("bkua_token"),
            Duration::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_listen_address() {
        assert_eq!(parse_listen_address(":9101").unwrap(), "0.0.0.0:9101");
        assert_eq!(parse_listen_address("127.0.0.1:8080").unwrap(), "127.0.0.1:8080");
        assert_eq!(parse_listen_address("[::1]:8080").unwrap(), "[::1]:8080");
        assert!(parse_listen_address("localhost").is_err());
        assert!(parse_listen_address(":notaport").is_err());
        assert!(parse_listen_address("localhost:70000").is_err());
    }

    #[test]
    fn test_listen_address_accepts_host_names() {
        assert_eq!(
            parse_listen_address("localhost:9101").unwrap(),
            "localhost:9101"
        );
        assert_eq!(
            parse_listen_address("metrics.internal:9101").unwrap(),
            "metrics.internal:9101"
        );
    }

    #[test]
    fn test_parse_timeout_units() {
        assert_eq!(parse_timeout("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_timeout("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_timeout("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_timeout("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_timeout("10h").is_err());
        assert!(parse_timeout("s").is_err());
        assert!(parse_timeout("").is_err());
    }

    #[test]
    fn test_debug_output_hides_token() {
        let config = config(Some("acme"), Some("bkua_secret")).unwrap();
        assert!(!format!("{config:?}").contains("bkua_secret"));
    }
}
