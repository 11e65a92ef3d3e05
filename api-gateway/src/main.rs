//! Azure NetApp Files tool gateway
//!
//! Serves the NetApp tool registry over HTTP with:
//! - Schema validation before any Azure call
//! - ARM or in-memory provider
//! - Audit to the log or a hash-chained SQLite ledger

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use anf_tools::provider::arm::{ArmProvider, ArmSettings};
use anf_tools::provider::credential::{ClientSecretCredential, StaticToken, TokenCredential};
use anf_tools::provider::memory::InMemoryProvider;
use anf_tools::resources::build_registry;
use anf_tools::{AuditLog, AuditSink, Collaborators, Dispatcher, NetAppProvider, TracingAudit};

mod config;
mod server;

use config::{ConfigSource, Credentials, GatewayConfig, LoggingConfig, ProviderKind};

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn build_provider(config: &GatewayConfig) -> Result<Arc<dyn NetAppProvider>> {
    match config.provider {
        ProviderKind::Memory => {
            warn!("Using in-memory provider: no Azure resources will be touched");
            Ok(Arc::new(InMemoryProvider::new()))
        }
        ProviderKind::Arm => {
            let azure = &config.azure;
            let client = reqwest::Client::builder()
                .user_agent(concat!("anf-gateway/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("Failed to build HTTP client")?;
            let credential: Arc<dyn TokenCredential> = match azure.credentials() {
                Some(Credentials::Token(token)) => Arc::new(StaticToken::new(token)),
                Some(Credentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                }) => Arc::new(
                    ClientSecretCredential::new(tenant_id, client_id, client_secret, client.clone())
                        .with_authority(azure.authority.as_str()),
                ),
                None => anyhow::bail!("No Azure credentials configured"),
            };
            let settings = ArmSettings {
                endpoint: azure.endpoint.clone(),
                api_version: azure.api_version.clone(),
                poll_interval: azure.poll_interval(),
                operation_timeout: azure.operation_timeout(),
            };
            info!("ARM endpoint {} (api-version {})", settings.endpoint, settings.api_version);
            Ok(Arc::new(ArmProvider::new(client, credential, settings)))
        }
    }
}

fn build_audit(config: &GatewayConfig) -> Result<Arc<dyn AuditSink>> {
    if !config.audit.enabled {
        return Ok(Arc::new(TracingAudit));
    }
    let log = AuditLog::new(&config.audit.db_path)
        .with_context(|| format!("Failed to open audit ledger at {}", config.audit.db_path))?;
    if !log.verify_chain()? {
        warn!("Audit ledger at {} failed chain verification", config.audit.db_path);
    }
    info!("Audit ledger: {} ({} entries)", config.audit.db_path, log.entry_count()?);
    Ok(Arc::new(log))
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = config::load_config()?;
    init_logging(&config.logging);

    info!("ANF tool gateway starting...");
    match &source {
        ConfigSource::File(path) => info!("Loaded config from {path}"),
        ConfigSource::Missing(path) => warn!("Config file not found at {path}, using defaults"),
    }

    let registry = build_registry().context("Failed to build tool registry")?;
    let dispatcher = Dispatcher::new(registry);

    let defaults = config.azure.defaults();
    if defaults.subscription_id.is_none() {
        warn!("No default subscription: every request must carry subscriptionId");
    }
    let collaborators = Collaborators::new(build_provider(&config)?, build_audit(&config)?)
        .with_defaults(defaults);

    if config.server.api_key.is_none() {
        warn!("No API key configured (MCP_API_KEY): tool routes will refuse every request");
    }

    let state = server::AppState {
        dispatcher,
        collaborators,
        api_key: config.server.api_key.clone(),
    };

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    server::serve(listener, state)
        .await
        .context("Gateway HTTP server failed")?;

    Ok(())
}
