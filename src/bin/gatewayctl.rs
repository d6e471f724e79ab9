use clap::{Parser, Subcommand};
use replicate_gateway::api::auth::API_KEY_HEADER;
use replicate_gateway::Config;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gatewayctl", about = "CLI for the Replicate gateway", version)]
struct Cli {
    /// Gateway base URL (defaults to GATEWAY_URL or http://127.0.0.1:8000)
    #[arg(global = true, long)]
    url: Option<String>,

    /// Access key (defaults to API_ACCESS_KEY)
    #[arg(global = true, long)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a generation for a prompt
    Generate {
        /// Prompt text; must contain the trigger word when the gateway requires it
        prompt: String,
    },
    /// List predictions for the configured model
    List {
        /// Only show predictions with this status (e.g. processing, succeeded, failed)
        #[arg(long)]
        status: Option<String>,
        /// Output raw JSON instead of one line per prediction
        #[arg(long)]
        json: bool,
    },
    /// List predictions that are still processing
    Processing {
        #[arg(long)]
        json: bool,
    },
    /// Show one prediction with its file links
    Show {
        id: String,
    },
    /// Download one output file of a prediction
    Download {
        id: String,
        /// File name as listed by `show`, e.g. 0.jpg
        file: String,
        /// Output path (defaults to ./<id>-<file>)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

struct Gateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Gateway {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url).header(API_KEY_HEADER, &self.api_key)
    }

    async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| format!(" (retry after {}s)", v))
            .unwrap_or_default();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(format!("{}: {}{}", status, detail, retry_after).into())
    }

    async fn json(&self, request: RequestBuilder) -> Result<Value, Box<dyn std::error::Error>> {
        Ok(self.send(request).await?.json().await?)
    }
}

#[tokio::main]
async fn main() {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let base_url = cli
        .url
        .or_else(|| std::env::var("GATEWAY_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    let api_key = cli
        .api_key
        .or_else(|| std::env::var("API_ACCESS_KEY").ok())
        .ok_or("No access key: pass --api-key or set API_ACCESS_KEY")?;
    let gateway = Gateway {
        client: Client::new(),
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
    };

    match cli.command {
        Commands::Generate { prompt } => {
            let request = gateway
                .request(reqwest::Method::POST, "/generate")
                .json(&json!({ "prompt": prompt }));
            let v = gateway.json(request).await?;
            println!("{}", serde_json::to_string_pretty(&v)?);
        }
        Commands::List { status, json } => {
            let mut request = gateway.request(reqwest::Method::GET, "/predictions");
            if let Some(s) = status {
                request = request.query(&[("status", s)]);
            }
            print_listing(&gateway.json(request).await?, json)?;
        }
        Commands::Processing { json } => {
            let request = gateway.request(reqwest::Method::GET, "/processing");
            print_listing(&gateway.json(request).await?, json)?;
        }
        Commands::Show { id } => {
            let request = gateway.request(reqwest::Method::GET, &format!("/predictions/{}", id));
            let v = gateway.json(request).await?;
            println!("{}", serde_json::to_string_pretty(&v)?);
        }
        Commands::Download { id, file, out } => {
            let route = format!("/predictions/{}/files/{}", id, file);
            let request = gateway.request(reqwest::Method::GET, &route);
            let bytes = gateway.send(request).await?.bytes().await?;
            let path = out.unwrap_or_else(|| PathBuf::from(format!("{}-{}", id, file)));
            tokio::fs::write(&path, &bytes).await?;
            println!("Saved {} ({} bytes)", path.display(), bytes.len());
        }
    }
    Ok(())
}

fn print_listing(v: &Value, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(v)?);
        return Ok(());
    }
    match v.as_array() {
        Some(items) if items.is_empty() => eprintln!("No predictions"),
        Some(items) => {
            for item in items {
                let field = |k: &str| {
                    item.get(k).and_then(|x| x.as_str()).unwrap_or("-").to_string()
                };
                println!("{}\t{}\t{}", field("id"), field("status"), field("created_at"));
            }
        }
        None => println!("{}", serde_json::to_string_pretty(v)?),
    }
    Ok(())
}
