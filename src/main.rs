use anyhow::{Context, Result, bail};
use clap::Parser;
use reqcomposer::cache::CacheRegistry;
use reqcomposer::runtime::RealRuntime;
use reqcomposer::{ServiceConfig, ServiceFactory};
use std::path::PathBuf;

/// reqcomposer - send one HTTP request through the retrying adapter
///
/// The JSON response body is printed to stdout, the status line to stderr.
///
/// Examples:
///   reqcomposer https://jsonplaceholder.typicode.com/posts/42
///   reqcomposer -X POST -d '{"title":"x"}' https://example.com/posts
#[derive(Parser, Debug)]
#[command(author, version = env!("REQCOMPOSER_VERSION"), about)]
struct Cli {
    /// Service configuration file (JSON)
    #[arg(
        long = "config",
        short = 'c',
        env = "REQCOMPOSER_CONFIG",
        value_name = "PATH"
    )]
    config: Option<PathBuf>,

    /// HTTP method
    #[arg(long = "request", short = 'X', default_value = "GET", value_name = "METHOD")]
    method: String,

    /// Extra request header, may be repeated
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// JSON request body
    #[arg(long = "data", short = 'd', value_name = "JSON")]
    data: Option<String>,

    /// Seed name to replay from or record to (when seeds are enabled)
    #[arg(long = "seed", value_name = "NAME")]
    seed: Option<String>,

    #[arg(value_name = "URI")]
    uri: String,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("Invalid header '{}'. Expected 'Name: value'.", raw),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(&RealRuntime, path)?,
        None => ServiceConfig::default(),
    };

    let mut service = ServiceFactory::new(CacheRegistry::new()).create(config)?;
    service.set_uri(cli.uri.as_str());
    for raw in &cli.headers {
        let (name, value) = parse_header(raw)?;
        service.set_header(name, value);
    }
    if let Some(data) = &cli.data {
        let body = serde_json::from_str(data).context("--data must be valid JSON")?;
        service.set_body(body);
    }
    if let Some(seed) = &cli.seed {
        service.use_seed(seed.as_str());
    }

    let body = service.request(&cli.method.to_ascii_uppercase()).await?;

    if let Some(status) = service.last_status() {
        eprintln!("HTTP {}", status);
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
