//! Command-line client for the uiharness automation server
//!
//! Each invocation opens one connection, sends one command and prints the
//! outcome as a single JSON line on stdout. Logs go to stderr.

mod client;
mod compare;
mod errors;

use anyhow::{Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uiharness_protocol::{DEFAULT_PORT, Point};

use crate::client::HarnessClient;
use crate::compare::Algorithm;
use crate::errors::ClientError;

/// Drive an application under test over its automation port
#[derive(Debug, Parser)]
#[command(name = "uiharness", version)]
struct Cli {
    /// Server host
    #[arg(long, env = "UIHARNESS_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Server port
    #[arg(short, long, env = "UIHARNESS_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Response timeout in milliseconds, on top of any wait or hold duration
    #[arg(long, default_value_t = 35_000, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(flatten)]
    Remote(RemoteCommand),

    /// Compare two PNG files locally
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(long, value_enum, default_value_t = Algorithm::Hybrid)]
        algorithm: Algorithm,
    },
}

/// Commands sent to the automation server
#[derive(Debug, Subcommand)]
enum RemoteCommand {
    /// Click a registered widget
    Click { id: String },

    /// Press and hold a registered widget
    Longpress {
        id: String,
        /// Hold duration [default: 1000]
        #[arg(long)]
        ms: Option<u32>,
    },

    /// Swipe between two points
    #[command(after_help = "\
Examples:
  uiharness swipe 400 240 80 240        # Swipe left
  uiharness swipe 80 240 400 240        # Swipe right")]
    Swipe { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// Send a key code
    Key { code: u32 },

    /// Read a widget's text
    GetState { id: String },

    /// Replace a widget's text
    SetText { id: String, text: String },

    /// Capture the current frame as PNG
    #[command(after_help = "\
Without --output the PNG is printed base64-encoded in the \"data\" field.")]
    Screenshot {
        /// Write the PNG to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Pause command execution on the UI thread
    Wait { ms: u32 },

    /// Click whatever widget lies under a point
    ClickAt { x: i32, y: i32 },

    /// Move the pointer without pressing
    MouseMove { x: i32, y: i32 },

    /// Press, move and release between two points
    Drag { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// List registered widget ids
    Widgets,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Compare { a, b, algorithm } => {
            let result = compare::compare_files(&a, &b, algorithm)?;
            println!("{}", serde_json::to_string(&result)?);
            return Ok(());
        }
        Commands::Remote(command) => command,
    };

    let addr = format!("{}:{}", cli.host, cli.port);
    tracing::info!("Connecting to {}", addr);
    let mut client = HarnessClient::connect(addr.as_str())
        .await?
        .with_timeout(Duration::from_millis(cli.timeout_ms));

    match run(&mut client, command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => match e.downcast_ref::<ClientError>() {
            Some(ClientError::Rejected { cmd, reason }) => {
                println!("{}", json!({"status": "error", "cmd": cmd, "error": reason}));
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}

fn ok(cmd: &str) -> Value {
    json!({"status": "ok", "cmd": cmd})
}

async fn run(client: &mut HarnessClient, command: RemoteCommand) -> Result<Value> {
    let output = match command {
        RemoteCommand::Click { id } => {
            client.click(&id).await?;
            ok("click")
        }
        RemoteCommand::Longpress { id, ms } => {
            client.longpress(&id, ms).await?;
            ok("longpress")
        }
        RemoteCommand::Swipe { x1, y1, x2, y2 } => {
            client.swipe(Point::new(x1, y1), Point::new(x2, y2)).await?;
            ok("swipe")
        }
        RemoteCommand::Key { code } => {
            client.key(code).await?;
            ok("key")
        }
        RemoteCommand::GetState { id } => {
            let text = client.get_state(&id).await?;
            json!({"status": "ok", "cmd": "get_state", "id": id, "text": text})
        }
        RemoteCommand::SetText { id, text } => {
            client.set_text(&id, &text).await?;
            ok("set_text")
        }
        RemoteCommand::Screenshot { output } => {
            let shot = client.screenshot().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &shot.png)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    json!({
                        "status": "ok",
                        "cmd": "screenshot",
                        "width": shot.width,
                        "height": shot.height,
                        "file_path": path.display().to_string(),
                        "size_bytes": shot.png.len(),
                    })
                }
                None => json!({
                    "status": "ok",
                    "cmd": "screenshot",
                    "width": shot.width,
                    "height": shot.height,
                    "format": "PNG",
                    "data": base64::engine::general_purpose::STANDARD.encode(&shot.png),
                }),
            }
        }
        RemoteCommand::Wait { ms } => {
            client.wait(ms).await?;
            ok("wait")
        }
        RemoteCommand::ClickAt { x, y } => {
            client.click_at(Point::new(x, y)).await?;
            ok("click_at")
        }
        RemoteCommand::MouseMove { x, y } => {
            client.mouse_move(Point::new(x, y)).await?;
            ok("mouse_move")
        }
        RemoteCommand::Drag { x1, y1, x2, y2 } => {
            client.drag(Point::new(x1, y1), Point::new(x2, y2)).await?;
            ok("drag")
        }
        RemoteCommand::Widgets => {
            let widgets = client.list_widgets().await?;
            json!({"status": "ok", "cmd": "list_widgets", "widgets": widgets})
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_swipe() {
        let cli = Cli::try_parse_from(["uiharness", "swipe", "400", "240", "80", "240"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Remote(RemoteCommand::Swipe {
                x1: 400,
                y1: 240,
                x2: 80,
                y2: 240
            })
        ));
        assert_eq!(cli.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_screenshot_output_and_port() {
        let cli = Cli::try_parse_from(["uiharness", "screenshot", "-o", "shot.png", "--port", "4000"])
            .unwrap();
        assert_eq!(cli.port, 4000);
        assert!(matches!(
            cli.command,
            Commands::Remote(RemoteCommand::Screenshot { output: Some(ref p) }) if p == &PathBuf::from("shot.png")
        ));
    }

    #[test]
    fn test_parse_compare_algorithm() {
        let cli = Cli::try_parse_from(["uiharness", "compare", "a.png", "b.png", "--algorithm", "rms"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Compare {
                algorithm: Algorithm::Rms,
                ..
            }
        ));
    }
}
