//! Process entrypoint: loads `RuntimeConfig`, registers local agents
//! discovered on disk, wires the SDK's handler registry and
//! wba-framework's storage adapters together, and serves the
//! `wba-server` HTTP app with graceful shutdown — mirroring a typical
//! binary startup sequence (config load, `structured_logger::Builder` init,
//! `#[tokio::main]`, `CancellationToken`-driven shutdown).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use wba_core::crypto::SigningMaterial;
use wba_core::document::DidDocument;
use wba_framework::{CachedResolver, ChainResolver, HttpResolver, InMemorySessionStore, InMemoryTokenCache, InMemoryTokenIssuer, LocalFsResolver};
use wba_sdk::config::AuthConfig;
use wba_sdk::credentials::AgentCredentials;
use wba_sdk::handlers::{BearerHandler, CustomTokenHandler, DidWbaHandler, SessionHandler};
use wba_sdk::registry::{AuthDispatch, HandlerRegistry};
use wba_sdk::session::SessionAwareAuthManager;
use wba_server::{AgentRouter, LocalAgent, ServerBuilder};

#[derive(Parser, Debug)]
#[command(name = "wba-runtime", about = "Serves the did:wba agent interoperability runtime.")]
struct Cli {
    /// Path to a RuntimeConfig TOML file (optional; all fields have defaults).
    #[arg(long, env = "WBA_CONFIG", default_value = "config/wba-runtime.toml")]
    config: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RuntimeConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_user_did_path")]
    user_did_path: PathBuf,
    #[serde(default = "default_user_hosted_path")]
    user_hosted_path: PathBuf,
    #[serde(default = "default_interfaces_root")]
    interfaces_root: PathBuf,
    #[serde(default = "default_nonce_expire_minutes")]
    nonce_expire_minutes: i64,
    #[serde(default = "default_token_expire_time")]
    token_expire_time: i64,
    #[serde(default = "default_session_expire_hours")]
    session_expire_hours: i64,
    #[serde(default = "default_exempt_paths")]
    exempt_paths: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9527
}
fn default_user_did_path() -> PathBuf {
    PathBuf::from("./data/user_did")
}
fn default_user_hosted_path() -> PathBuf {
    PathBuf::from("./data/user_hosted")
}
fn default_interfaces_root() -> PathBuf {
    PathBuf::from("./data/interfaces")
}
fn default_nonce_expire_minutes() -> i64 {
    5
}
fn default_token_expire_time() -> i64 {
    3600
}
fn default_session_expire_hours() -> i64 {
    24
}
fn default_exempt_paths() -> Vec<String> {
    vec!["/wba/".to_string(), "/publisher/agents".to_string(), "/docs".to_string(), "/openapi.json".to_string()]
}

fn load_config(path: &str) -> Result<RuntimeConfig, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("WBA").separator("__"))
        .build()?
        .try_deserialize()
}

/// The minimal `agent_cfg.yaml` reader: just enough fields to pair a
/// `did_document.json` with the private key and display name an
/// operator configured for it.
#[derive(Debug, Deserialize)]
struct AgentFileConfig {
    name: String,
    #[serde(default = "default_key_type")]
    key_type: String,
    private_key_hex: String,
    verification_method_id: Option<String>,
}

fn default_key_type() -> String {
    "secp256k1".to_string()
}

async fn load_agents_from(root: &Path, hosted: bool, router: &AgentRouter) -> Result<usize, wba_core::BoxError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(_) => return Ok(0),
    };

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let document_path = dir.join("did_document.json");
        let config_path = dir.join("agent_cfg.yaml");
        let Ok(document_bytes) = tokio::fs::read(&document_path).await else {
            continue;
        };
        if !config_path.exists() {
            log::warn!(dir = dir.display().to_string().as_str(); "agent directory missing agent_cfg.yaml, skipping");
            continue;
        }

        let document: DidDocument = serde_json::from_slice(&document_bytes)?;
        let agent_cfg: AgentFileConfig = config::Config::builder()
            .add_source(config::File::from(config_path))
            .build()?
            .try_deserialize()?;

        let signing = match agent_cfg.key_type.as_str() {
            "ed25519" => {
                let bytes = hex::decode(&agent_cfg.private_key_hex)?;
                SigningMaterial::from_ed25519_bytes(&bytes)?
            }
            _ => SigningMaterial::from_secp256k1_hex(&agent_cfg.private_key_hex)?,
        };
        let verification_method_id = agent_cfg.verification_method_id.unwrap_or_else(|| format!("{}#keys-1", document.id));
        let credentials = AgentCredentials::new(document.id.clone(), verification_method_id, signing);

        let did = document.id.clone();
        let mut agent = LocalAgent::new(did.clone(), agent_cfg.name, document, credentials);
        if hosted {
            agent = agent.hosted();
        }
        router.register(agent)?;
        log::info!(did = did.as_str(), hosted = hosted; "registered local agent");
        count += 1;
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<(), wba_core::BoxError> {
    dotenv::dotenv().ok();
    structured_logger::Builder::with_level("info")
        .with_target_writer("*", structured_logger::async_json::new_writer(tokio::io::stdout()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    log::info!(host = config.host.as_str(), port = config.port; "loaded RuntimeConfig");

    let router = Arc::new(AgentRouter::new());
    let local_count = load_agents_from(&config.user_did_path, false, &router).await?;
    let hosted_count = load_agents_from(&config.user_hosted_path, true, &router).await?;
    log::info!(local_agents = local_count, hosted_agents = hosted_count; "agent directories scanned");

    let local_resolver = LocalFsResolver::new(config.user_did_path.clone(), config.user_hosted_path.clone());
    let remote_resolver = CachedResolver::new(HttpResolver::new());
    let resolver: Arc<dyn wba_sdk::resolver::DidResolver> = Arc::new(ChainResolver::new(local_resolver, remote_resolver));

    let token_issuer = Arc::new(InMemoryTokenIssuer::new());
    let token_cache = Arc::new(InMemoryTokenCache::new());
    let session_store = Arc::new(InMemorySessionStore::new());

    let auth_config = AuthConfig {
        nonce_expire_minutes: config.nonce_expire_minutes,
        token_expire_time_secs: config.token_expire_time,
        session_expire_hours: config.session_expire_hours,
    };

    let registry = HandlerRegistry::new()
        .register(Arc::new(DidWbaHandler::new(resolver, auth_config.clone()).with_token_issuer(token_issuer.clone())))
        .register(Arc::new(BearerHandler::new(token_issuer).with_cache(token_cache)))
        .register(Arc::new(CustomTokenHandler))
        .register(Arc::new(SessionHandler::new(session_store.clone()).with_config(auth_config.clone())));

    let handlers: Arc<dyn AuthDispatch> = Arc::new(SessionAwareAuthManager::new(registry, session_store, auth_config));

    let cancel_token = CancellationToken::new();
    let shutdown = {
        let cancel_token = cancel_token.clone();
        async move {
            cancel_token.cancelled().await;
        }
    };
    tokio::spawn(wba_server::shutdown_signal(cancel_token, Duration::from_secs(1)));

    ServerBuilder::new()
        .with_addr(format!("{}:{}", config.host, config.port))
        .with_agents(router)
        .with_handlers(handlers)
        .with_exempt_paths(config.exempt_paths)
        .with_interfaces_root(config.interfaces_root)
        .serve(shutdown)
        .await
}
