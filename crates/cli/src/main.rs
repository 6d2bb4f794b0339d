// # -----------------------------
// # crates/cli/src/main.rs
// # -----------------------------
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsgate_cli::doctor::{exit_code, gather_report, print_human, print_json};
use fsgate_cli::settings::{init_tracing, ConfigArgs};
use fsgate_gateway::{tool_definitions, Dispatcher};
use serde_json::Value;
use std::io::{stdin, Read};

#[derive(Parser, Debug)]
#[command(
    name = "fsgate",
    version,
    about = "fsgate - sandboxed multi-service file access",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tools: list and call
    Tool {
        #[command(subcommand)]
        action: ToolCmd,
    },

    /// Check project layout, OPA binary and policy file
    Doctor {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
        /// Exit non-zero when a check is not OK
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ToolCmd {
    /// List available tools (JSON)
    List,
    /// Call a tool once through the full admission pipeline
    Call {
        /// Tool name: read_multi_service_file, list_service_files,
        /// search_across_services or get_project_structure
        name: String,
        /// Arguments as a JSON object, or '-' to read them from stdin
        #[arg(default_value = "-")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = cli.config.load()?;

    match cli.command {
        Commands::Tool { action: ToolCmd::List } => {
            println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
        }
        Commands::Tool {
            action: ToolCmd::Call { name, input },
        } => {
            let args = read_args(&input)?;
            let dispatcher = Dispatcher::from_config(&cfg).context("build dispatcher")?;
            let result = dispatcher.call(&name, &args).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_error {
                std::process::exit(1);
            }
        }
        Commands::Doctor { json, strict } => {
            let report = gather_report(&cfg)?;
            if json {
                print_json(&report)?;
            } else {
                print_human(&report);
            }
            if strict {
                std::process::exit(exit_code(&report));
            }
        }
    }
    Ok(())
}

fn read_args(input: &str) -> Result<Value> {
    let raw = if input == "-" {
        let mut s = String::new();
        stdin().read_to_string(&mut s).context("read arguments from stdin")?;
        s
    } else {
        input.to_string()
    };
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&raw).context("arguments must be a JSON object")
}
