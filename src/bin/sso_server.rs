//!
//! sso server binary
//! -----------------
//! Command-line entry point for the SSO server. Configuration comes from `SSO_*` environment
//! variables; CLI flags override the environment.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ssobridge::identity::{SsoProvider, StaticProvider};
use ssobridge::ServerConfig;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    arg_value(args, flag).and_then(|v| v.parse::<u16>().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

const USAGE: &str = "sso_server\n\nUSAGE:\n  sso_server [--http-port N] [--providers PATH] [--snapshot PATH] [--bridge-ttl SECS]\n\nOPTIONS:\n  --http-port N        HTTP port (env: SSO_HTTP_PORT, default 7878)\n  --providers PATH     Brokers and users JSON file (env: SSO_PROVIDERS_FILE)\n  --snapshot PATH      Bridge cache snapshot file (env: SSO_SNAPSHOT)\n  --bridge-ttl SECS    Bridge entry lifetime (env: SSO_BRIDGE_TTL_SECS, default 36000)\n";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // CLI arguments override environment
    let mut config = ServerConfig::from_env();
    if let Some(p) = parse_port_arg(&args, "--http-port") { config.http_port = p; }
    if let Some(p) = arg_value(&args, "--providers") { config.providers_file = Some(PathBuf::from(p)); }
    if let Some(p) = arg_value(&args, "--snapshot") { config.snapshot_path = Some(PathBuf::from(p)); }
    if let Some(s) = arg_value(&args, "--bridge-ttl") {
        let secs = s.parse::<u64>().with_context(|| format!("invalid --bridge-ttl '{}'", s))?;
        config.bridge_ttl = Duration::from_secs(secs);
    }

    let provider: Arc<dyn SsoProvider> = match &config.providers_file {
        Some(path) => {
            Arc::new(StaticProvider::load(path)?)
        }
        None => {
            tracing::warn!(target: "startup", "no providers file configured; no broker can attach");
            Arc::new(StaticProvider::new())
        }
    };

    tracing::info!(
        target: "startup",
        http_port = config.http_port,
        bridge_ttl_secs = config.bridge_ttl.as_secs(),
        attach_requires_login = config.attach_requires_login,
        "sso server starting"
    );
    ssobridge::server::run(config, provider).await
}
