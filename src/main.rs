//! Command-line entry point.
//!
//! ```text
//! discord_provider request <METHOD> <PATH> [JSON_BODY]
//! discord_provider read <TYPE> <ID> [KEY=VALUE ...]
//! discord_provider types
//! ```
//!
//! `DISCORD_TOKEN` is required for anything that talks to the API.
//! `DISCORD_API_URL` overrides the base URL and `DISCORD_AUDIT_REASON` is
//! attached to write calls.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use discord_provider::http::parse_method;
use discord_provider::{Context, ProviderConfig, Registry, ResourceData, RestClient};

/// Talk to the Discord REST API through the provider's transport.
#[derive(Parser)]
#[command(name = "discord_provider")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Base URL of the REST API.
    #[arg(long, env = "DISCORD_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one raw request and print the JSON reply.
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        path: String,
        /// JSON request body.
        #[arg(value_parser = parse_json)]
        body: Option<Value>,
        /// Sent as the audit log reason on write calls.
        #[arg(long, env = "DISCORD_AUDIT_REASON")]
        reason: Option<String>,
    },

    /// Read one resource and print its state.
    Read {
        #[arg(value_parser = parse_type_name)]
        type_name: String,
        id: String,
        /// Attributes the read needs, e.g. `server_id=123`.
        #[arg(value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,
    },

    /// List the resource type names.
    Types,
}

fn parse_type_name(name: &str) -> Result<String, String> {
    match Registry::standard().get(name) {
        Some(_) => Ok(name.to_string()),
        None => Err(format!("unknown resource type {name:?}; see `types`")),
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|err| err.to_string())
}

/// `key=value`; values that parse as JSON are kept typed.
fn parse_attribute(pair: &str) -> Result<(String, Value), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {pair:?}"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

fn config(cli: &Cli) -> Option<ProviderConfig> {
    let Some(token) = cli.token.as_deref().filter(|t| !t.is_empty()) else {
        error!("DISCORD_TOKEN environment variable not set");
        return None;
    };
    let mut config = ProviderConfig::new(token);
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url.clone());
    }
    Some(config)
}

async fn request(
    config: ProviderConfig,
    method: Method,
    path: &str,
    body: Option<&Value>,
    reason: Option<&str>,
) -> discord_provider::Result<()> {
    let client = RestClient::new(&config)?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let reply: Option<Value> = client
        .do_json(&cancel, method, path, None, body, reason)
        .await?;
    match reply {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => info!("no content"),
    }
    Ok(())
}

async fn read(
    config: ProviderConfig,
    type_name: &str,
    id: &str,
    attributes: Map<String, Value>,
) -> discord_provider::Result<()> {
    let registry = Registry::standard();
    let Some(resource) = registry.get(type_name) else {
        return Err(discord_provider::Error::MissingField(format!(
            "resource type {type_name}"
        )));
    };
    let ctx = Context::new(config)?;
    let mut data = ResourceData::with_id(id, attributes);
    resource.read(&ctx, &mut data).await?;

    if data.is_absent() {
        info!(type_name, id, "not found");
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&Value::Object(data.values().clone()))?
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Respects RUST_LOG, defaults to info.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Before parsing so `.env` can supply the token.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Types = cli.command {
        for name in Registry::standard().type_names() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    let Some(config) = config(&cli) else {
        return ExitCode::FAILURE;
    };
    let result = match cli.command {
        Commands::Request {
            method,
            path,
            body,
            reason,
        } => request(config, method, &path, body.as_ref(), reason.as_deref()).await,
        Commands::Read {
            type_name,
            id,
            attributes,
        } => read(config, &type_name, &id, attributes.into_iter().collect()).await,
        Commands::Types => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
