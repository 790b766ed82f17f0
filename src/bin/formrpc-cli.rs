use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use formrpc::config::{load_config, RpcConfig};
use formrpc::{CallInput, Client, ClientError, FormPayload};

#[derive(Parser)]
#[command(name = "formrpc-cli")]
#[command(about = "Call formrpc procedures from the command line", long_about = None)]
struct Cli {
    /// Server base URL (overrides `client.url`)
    #[arg(short, long)]
    url: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a query procedure
    Query(CallArgs),
    /// Call a mutation procedure
    Mutate(CallArgs),
}

#[derive(Args)]
struct CallArgs {
    /// Procedure path, e.g. `getUser`
    path: String,

    /// JSON input
    #[arg(short, long, conflicts_with_all = ["field", "file"])]
    input: Option<String>,

    /// Text form field `name=value`; sends multipart
    #[arg(short, long, value_name = "NAME=VALUE")]
    field: Vec<String>,

    /// File form field `name=path`; sends multipart
    #[arg(long, value_name = "NAME=PATH")]
    file: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RpcConfig::default(),
    };
    if let Some(url) = cli.url {
        config.client.url = url;
    }
    let client = Client::from_config(&config.client, &config.retries)?;

    let result = match cli.command {
        Commands::Query(args) => {
            let input = build_input(&args).await?;
            client.query(&args.path, input).await
        }
        Commands::Mutate(args) => {
            let input = build_input(&args).await?;
            client.mutation(&args.path, input).await
        }
    };

    print_result(result)
}

async fn build_input(args: &CallArgs) -> Result<CallInput, Box<dyn std::error::Error>> {
    if args.field.is_empty() && args.file.is_empty() {
        let value = match &args.input {
            Some(raw) => serde_json::from_str(raw)?,
            None => Value::Null,
        };
        return Ok(CallInput::Json(value));
    }

    let mut form = FormPayload::new();
    for field in &args.field {
        let (name, value) = split_pair(field)?;
        form = form.text(name, value);
    }
    for file in &args.file {
        let (name, path) = split_pair(file)?;
        let bytes = tokio::fs::read(path).await?;
        let filename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path)
            .to_string();
        form = form.file(name, filename, guess_mime(path), bytes);
    }
    Ok(CallInput::Form(form))
}

fn split_pair(pair: &str) -> Result<(&str, &str), String> {
    pair.split_once('=')
        .ok_or_else(|| format!("Expected NAME=VALUE, got \"{}\"", pair))
}

fn guess_mime(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn print_result(result: Result<Value, ClientError>) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Err(ClientError::Rpc { code, message, issues }) => {
            eprintln!("Error: {} {}", code, message);
            for issue in issues {
                eprintln!("  {}: {}", issue.path, issue.message);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
