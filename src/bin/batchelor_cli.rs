//! batchelor-cli — 从文件读取批量请求并执行
//!
//! Usage:
//!   batchelor-cli run <options.yaml> <requests.yaml>   Send a batch and print the result as JSON
//!   batchelor-cli encode <requests.yaml>               Print the encoded parts without sending
//!   batchelor-cli version                              Show version information

use anyhow::{bail, Context, Result};
use batchelor::multipart::{encode, serialize_body};
use batchelor::{BatchOptions, Batchelor, SubRequest};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]).await,
        "encode" => cmd_encode(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("batchelor-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"batchelor-cli — send many API calls as one multipart batch

USAGE:
    batchelor-cli <COMMAND> [ARGS]

COMMANDS:
    run <options> <requests>    Send the batch and print the aggregate result as JSON
    encode <requests>           Print the multipart body that would be sent
    version                     Show version information
    help                        Show this help message

FILES:
    <options>    YAML/JSON outer request options (uri, method, headers, auth)
    <requests>   YAML/JSON list of sub-requests (method, path, parameters, auth)

ENVIRONMENT:
    BATCHELOR_HTTP_TIMEOUT_SECS   Default request timeout (30)
    BATCHELOR_PROXY_URL           Proxy for all requests
    RUST_LOG                      Log filter (info)"#
    );
}

fn load_requests(path: &Path) -> Result<Vec<SubRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let requests = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    Ok(requests)
}

async fn cmd_run(args: &[String]) -> Result<()> {
    let [options_path, requests_path] = args else {
        bail!("usage: batchelor-cli run <options> <requests>");
    };

    let options = BatchOptions::from_path(options_path)
        .with_context(|| format!("loading options from {options_path}"))?;
    let client = Batchelor::new(options)?;
    client.add_all(load_requests(Path::new(requests_path))?)?;

    let outcome = client.run().await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_encode(args: &[String]) -> Result<()> {
    let [requests_path] = args else {
        bail!("usage: batchelor-cli encode <requests>");
    };

    // Queue through a client so ids are assigned and validated exactly as in `run`.
    let client = Batchelor::builder()
        .uri("http://localhost/batch")
        .build()?;
    client.add_all(load_requests(Path::new(requests_path))?)?;

    let parts = encode(&client.requests())?;
    let body = serialize_body("batch_preview", &parts);
    print!("{}", String::from_utf8_lossy(&body));
    Ok(())
}
