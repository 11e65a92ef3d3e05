//! Gateway configuration loading and parsing

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anf_tools::provider::arm::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use anf_tools::{fields, Defaults};

const DEFAULT_CONFIG_PATH: &str = "/etc/anf-gateway/config.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Azure Resource Manager REST API
    #[default]
    Arm,
    /// Process-local resources, for dry runs
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Required `x-api-key` value; requests are refused while unset
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pre-issued bearer token; takes precedence over the client secret
    pub access_token: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_group: None,
            location: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            endpoint: default_endpoint(),
            authority: default_authority(),
            api_version: default_api_version(),
            poll_interval_seconds: default_poll_interval(),
            operation_timeout_seconds: default_operation_timeout(),
        }
    }
}

/// How the gateway authenticates to ARM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials<'a> {
    Token(&'a str),
    ClientSecret {
        tenant_id: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
    },
}

impl AzureConfig {
    pub fn defaults(&self) -> Defaults {
        Defaults {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
        }
    }

    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if let Some(token) = self.access_token.as_deref() {
            return Some(Credentials::Token(token));
        }
        match (
            self.tenant_id.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Some(Credentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Write the hash-chained SQLite ledger; otherwise audit goes to the log
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_audit_db")]
    pub db_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: default_audit_db(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_listen() -> String { "0.0.0.0:8080".into() }
fn default_endpoint() -> String { DEFAULT_ENDPOINT.into() }
fn default_authority() -> String { anf_tools::provider::credential::DEFAULT_AUTHORITY.into() }
fn default_api_version() -> String { DEFAULT_API_VERSION.into() }
fn default_poll_interval() -> u64 { 5 }
fn default_operation_timeout() -> u64 { 1800 }
fn default_audit_db() -> String { "/var/lib/anf-gateway/audit.db".into() }
fn default_log_level() -> String { "info".into() }

impl GatewayConfig {
    /// Overlay the environment variables the service has always honoured
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut Option<String>, var: &str| {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };
        set(&mut self.server.api_key, "MCP_API_KEY");
        set(&mut self.azure.subscription_id, "AZURE_SUBSCRIPTION_ID");
        set(&mut self.azure.resource_group, "AZURE_RESOURCE_GROUP");
        set(&mut self.azure.location, "AZURE_LOCATION");
        set(&mut self.azure.tenant_id, "AZURE_TENANT_ID");
        set(&mut self.azure.client_id, "AZURE_CLIENT_ID");
        set(&mut self.azure.client_secret, "AZURE_CLIENT_SECRET");
        set(&mut self.azure.access_token, "AZURE_ACCESS_TOKEN");
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider == ProviderKind::Arm && self.azure.credentials().is_none() {
            bail!(
                "provider \"arm\" needs AZURE_ACCESS_TOKEN or AZURE_TENANT_ID, \
                 AZURE_CLIENT_ID and AZURE_CLIENT_SECRET"
            );
        }
        if self.azure.poll_interval_seconds == 0 {
            bail!("azure.poll_interval_seconds must be at least 1");
        }
        if self.azure.operation_timeout_seconds < self.azure.poll_interval_seconds {
            bail!("azure.operation_timeout_seconds must not be shorter than the poll interval");
        }
        // Defaults end up in ARM URLs and bodies, so they obey the same rules as arguments
        let defaults = [
            ("azure.subscription_id", &self.azure.subscription_id, fields::subscription_id()),
            ("azure.resource_group", &self.azure.resource_group, fields::resource_group_name()),
            ("azure.location", &self.azure.location, fields::location()),
        ];
        for (name, value, schema) in defaults {
            if let Some(value) = value {
                if let Err(e) = schema.validate(&Value::from(value.as_str())) {
                    bail!("{name}: {}", e.message);
                }
            }
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<GatewayConfig> {
    toml::from_str(content).context("Failed to parse gateway config")
}

/// Where the configuration came from, reported once logging is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(String),
    /// No file at this path; built-in defaults plus environment
    Missing(String),
}

/// Load configuration from $ANF_GATEWAY_CONFIG or /etc/anf-gateway/config.toml
pub fn load_config() -> Result<(GatewayConfig, ConfigSource)> {
    let config_path = std::env::var("ANF_GATEWAY_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(&config_path, |var| std::env::var(var).ok())
}

pub fn load_config_from(
    config_path: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(GatewayConfig, ConfigSource)> {
    let (mut config, source) = if Path::new(config_path).exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {config_path}"))?;
        let config = parse_config(&content)
            .with_context(|| format!("Invalid config in {config_path}"))?;
        (config, ConfigSource::File(config_path.to_string()))
    } else {
        (GatewayConfig::default(), ConfigSource::Missing(config_path.to_string()))
    };

    config.apply_env(lookup);
    config.validate()?;
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.provider, ProviderKind::Arm);
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.azure.api_version, "2024-07-01");
        assert_eq!(config.azure.operation_timeout(), Duration::from_secs(1800));
        assert!(!config.audit.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(
            r#"
provider = "memory"

[server]
listen = "127.0.0.1:9000"
api_key = "secret"

[azure]
subscription_id = "9b3a2c0e-1d4f-4a8b-9c7d-112233445566"
location = "westeurope"
poll_interval_seconds = 2

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Memory);
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
        assert_eq!(config.azure.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.azure.endpoint, "https://management.azure.com");
        assert_eq!(config.azure.defaults().location.as_deref(), Some("westeurope"));
        assert_eq!(config.azure.defaults().resource_group, None);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(parse_config("provider = \"aws\"").is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MCP_API_KEY", "from-env"),
            ("AZURE_RESOURCE_GROUP", "rg-env"),
            ("AZURE_LOCATION", ""),
        ]);
        let mut config = parse_config("[azure]\nlocation = \"eastus\"").unwrap();
        config.apply_env(|var| env.get(var).map(|v| v.to_string()));

        assert_eq!(config.server.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.azure.resource_group.as_deref(), Some("rg-env"));
        // empty values do not clear configured ones
        assert_eq!(config.azure.location.as_deref(), Some("eastus"));
    }

    #[test]
    fn test_arm_requires_credentials() {
        let mut config = GatewayConfig::default();
        assert!(config.validate().is_err());

        config.azure.tenant_id = Some("t".into());
        config.azure.client_id = Some("c".into());
        assert!(config.validate().is_err());

        config.azure.client_secret = Some("s".into());
        assert_eq!(
            config.azure.credentials(),
            Some(Credentials::ClientSecret {
                tenant_id: "t",
                client_id: "c",
                client_secret: "s"
            })
        );
        assert!(config.validate().is_ok());

        config.azure.access_token = Some("tok".into());
        assert_eq!(config.azure.credentials(), Some(Credentials::Token("tok")));
    }

    #[test]
    fn test_memory_provider_needs_no_credentials() {
        let config = parse_config("provider = \"memory\"").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_defaults_rejected() {
        let cases = [
            ("AZURE_SUBSCRIPTION_ID", "dummy", "azure.subscription_id"),
            ("AZURE_RESOURCE_GROUP", "rg/x", "azure.resource_group"),
            ("AZURE_LOCATION", "East US", "azure.location"),
        ];
        for (var, value, field) in cases {
            let mut config = parse_config("provider = \"memory\"").unwrap();
            config.apply_env(|v| (v == var).then(|| value.to_string()));
            let err = config.validate().unwrap_err().to_string();
            assert!(err.starts_with(field), "{var}={value}: {err}");
        }
    }

    #[test]
    fn test_wellformed_defaults_accepted() {
        let config = parse_config(
            r#"
provider = "memory"

[azure]
subscription_id = "9b3a2c0e-1d4f-4a8b-9c7d-112233445566"
resource_group = "rg-netapp.prod_1"
location = "eastus2"
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml").display().to_string();
        let env = |var: &str| (var == "AZURE_ACCESS_TOKEN").then(|| "tok".to_string());

        let (config, source) = load_config_from(&missing, env).unwrap();
        assert_eq!(source, ConfigSource::Missing(missing));
        assert_eq!(config.azure.credentials(), Some(Credentials::Token("tok")));

        let present = dir.path().join("config.toml");
        fs::write(&present, "provider = \"memory\"\n").unwrap();
        let present = present.display().to_string();
        let (config, source) = load_config_from(&present, |_| None).unwrap();
        assert_eq!(source, ConfigSource::File(present));
        assert_eq!(config.provider, ProviderKind::Memory);
    }

    #[test]
    fn test_timeout_shorter_than_poll_rejected() {
        let mut config = parse_config("provider = \"memory\"").unwrap();
        config.azure.poll_interval_seconds = 10;
        config.azure.operation_timeout_seconds = 5;
        assert!(config.validate().is_err());
    }
}
