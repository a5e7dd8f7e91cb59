//! choreo-rca - command-line entry point
//!
//! Every command prints to stdout; logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use choreo_rca::models::PatchRequest;
use choreo_rca::services::evidence::EvidenceTransformer;
use choreo_rca::services::remediation::{PatchRunEnd, RemediationApplier};
use choreo_rca::storage::ConfigService;
use choreo_rca_core::{ChatEvent, GatewayCredentials};
use choreo_rca_llm::{ChatStreamAssembler, ModelChunk};
use choreo_rca_tools::{active_forms, McpConnector};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "choreo-rca")]
#[command(about = "Evidence digests and remediation patch runs for OpenChoreo RCA", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $CHOREO_RCA_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the evidence digest of a raw tool result
    Digest {
        /// Tool that produced the result, e.g. get_traces
        #[arg(long)]
        tool: String,

        /// JSON file holding the result (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Apply a patch request and print its NDJSON event stream
    Patch {
        /// JSON file with namespace_name, project_name, environment_name and actions
        #[arg(long)]
        request: PathBuf,

        /// Bearer token presented to the gateway
        #[arg(long, env = "CHOREO_RCA_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Replay recorded model output as an NDJSON chat event stream
    Chat {
        /// One JSON object per line: {"text": ...} or {"tool": ..., "args": ...}
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

/// One recorded model output chunk.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkLine {
    Text {
        text: String,
    },
    ToolCall {
        tool: Option<String>,
        #[serde(default)]
        args: Value,
    },
}

impl From<ChunkLine> for ModelChunk {
    fn from(line: ChunkLine) -> Self {
        match line {
            ChunkLine::Text { text } => ModelChunk::Text(text),
            ChunkLine::ToolCall { tool, args } => ModelChunk::ToolCallChunk { name: tool, args },
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn digest(config: &ConfigService, tool: &str, input: Option<&Path>) -> Result<()> {
    let raw: Value = serde_json::from_str(&read_input(input)?).context("Input is not JSON")?;
    let transformer = EvidenceTransformer::from_config(config.get_config());
    println!("{}", transformer.transform(Some(tool), &raw));
    Ok(())
}

async fn patch(config: &ConfigService, request: &Path, token: String) -> Result<()> {
    let request: PatchRequest = serde_json::from_str(&read_input(Some(request))?)
        .context("Invalid patch request")?;

    let applier = RemediationApplier::new(Arc::new(McpConnector::new(config.gateway_config())));
    let credentials = GatewayCredentials::bearer(token);
    let (tx, mut rx) = mpsc::channel(32);

    let run = applier.stream_patch(&request.actions, &request.scope, &credentials, tx);
    let print = async move {
        while let Some(event) = rx.recv().await {
            print!("{}", event.to_ndjson()?);
        }
        Ok::<_, anyhow::Error>(())
    };

    let (end, printed) = tokio::join!(run, print);
    printed?;
    match end {
        PatchRunEnd::Completed(summary) => {
            tracing::info!("{}", summary.summary_line());
            Ok(())
        }
        PatchRunEnd::Aborted(message) => bail!("patch run aborted: {}", message),
        PatchRunEnd::Cancelled => bail!("patch run cancelled"),
    }
}

fn chat(input: Option<&Path>) -> Result<()> {
    let mut assembler = ChatStreamAssembler::new(active_forms());
    let emit = |event: &ChatEvent| -> Result<()> {
        print!("{}", event.to_ndjson()?);
        Ok(())
    };

    for line in read_input(input)?.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<ChunkLine>(line) {
            Ok(chunk) => {
                if let Some(event) = assembler.handle(chunk.into()) {
                    emit(&event)?;
                }
            }
            Err(e) => {
                emit(&assembler.fail(&e))?;
                bail!("invalid chunk line: {}", e);
            }
        }
    }

    for event in assembler.finish() {
        emit(&event)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigService::load(cli.config.as_deref())?;
    init_tracing(&config.get_config().log_level);
    match config.config_path() {
        Some(path) => tracing::debug!("Loaded config from {}", path.display()),
        None => tracing::debug!("Using default config"),
    }

    match cli.command {
        Commands::Digest { tool, input } => digest(&config, &tool, input.as_deref()),
        Commands::Patch { request, token } => patch(&config, &request, token).await,
        Commands::Chat { input } => chat(input.as_deref()),
    }
}
