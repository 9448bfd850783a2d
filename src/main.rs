//! Signature Auth demo gateway
//!
//! ```text
//! signature_auth [--env dev] [--port 8080]
//! ```
//!
//! Apps are provisioned through `SIGNATURE_AUTH_APP_*` environment variables
//! when `key_manager.storage` is `env`.

use std::sync::Arc;

use anyhow::Context;
use signature_auth::api_auth::{AuthConfig, AuthState};
use signature_auth::config::ServiceConfig;
use signature_auth::key_manager::KeyManager;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let service_config = ServiceConfig::load(&env)?;
    let _log_guard = signature_auth::logging::init_logging(&service_config);

    tracing::info!("Starting signature auth gateway in {} mode", env);

    let key_manager = Arc::new(KeyManager::new(service_config.key_manager.clone()));
    tracing::info!(
        storage = ?service_config.key_manager.storage,
        cache_enabled = service_config.key_manager.cache_enabled,
        cache_expiry_secs = service_config.key_manager.cache_expiry_secs,
        "Key manager ready"
    );

    let auth_config = AuthConfig::try_from(service_config.auth.clone())
        .context("Invalid auth configuration")?;
    let state = Arc::new(AuthState::new(auth_config, key_manager));

    let port = get_port_override().unwrap_or(service_config.gateway.port);
    signature_auth::gateway::run_server(&service_config.gateway.host, port, state).await
}
