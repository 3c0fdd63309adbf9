use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use provintel::tools::{dispatch, tool_catalog, ToolCall};
use provintel::IntelligenceService;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "provintel", about = "Provider Intelligence Aggregation & Selection Engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/provintel.toml")]
    config: String,

    /// Read the tool call JSON from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Print the tool catalogue and exit
    #[arg(long)]
    list_tools: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (respects RUST_LOG env var)
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    if cli.list_tools {
        println!("{}", to_json(&tool_catalog(), cli.pretty)?);
        return Ok(());
    }

    let config = provintel::load_config(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config))?;

    // Read tool call
    let call_json = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };
    let call: ToolCall =
        serde_json::from_str(&call_json).context("Failed to parse tool call JSON")?;

    let service = IntelligenceService::from_config(config).context("Failed to start service")?;

    let outcome = tokio::select! {
        result = dispatch(&service, &call) => Some(result),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            None
        }
    };

    service.shutdown().await.context("Failed to stop service")?;

    let Some(result) = outcome else {
        anyhow::bail!("Interrupted before the tool call completed");
    };
    let output = result.with_context(|| format!("Tool call failed: {}", call.tool))?;
    println!("{}", to_json(&output, cli.pretty)?);

    Ok(())
}
