use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "sabaiface", about = "SabaiFace face collection CLI")]
struct Cli {
    /// Base URL of the sabaifaced daemon
    #[arg(long, env = "SABAIFACE_URL", default_value = "http://127.0.0.1:8087")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and engine counters
    Health,
    /// Create an empty collection
    Create { collection: String },
    /// Delete a collection and all of its faces
    Delete { collection: String },
    /// List collection IDs
    List,
    /// Show face count and creation time of a collection
    Describe { collection: String },
    /// List the faces stored in a collection
    Faces {
        collection: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Detect faces in an image and add them to a collection
    Index {
        collection: String,
        #[arg(value_name = "FILE")]
        image: PathBuf,
        /// Label stored with every face (defaults to the file name)
        #[arg(long)]
        external_id: Option<String>,
        #[arg(long)]
        max_faces: Option<u32>,
    },
    /// Search a collection for faces similar to the most confident face in an image
    Search {
        collection: String,
        #[arg(value_name = "FILE")]
        image: PathBuf,
        /// Minimum similarity, 0-100
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        max_faces: Option<u32>,
    },
    /// Extract embeddings without storing anything
    Extract {
        #[arg(value_name = "FILE")]
        image: PathBuf,
    },
}

struct Daemon {
    base: String,
    http: reqwest::Client,
}

impl Daemon {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("cannot reach sabaifaced at {}", self.base))?;

        let status = resp.status();
        tracing::debug!(%status, path, "daemon responded");
        let body: Value = resp.json().await.context("daemon returned invalid JSON")?;
        if !status.is_success() {
            let kind = body["__type"].as_str().or(body["error"].as_str()).unwrap_or("error");
            let message = body["message"].as_str().or(body["detail"].as_str()).unwrap_or("");
            bail!("{status}: {kind}: {message}");
        }
        Ok(body)
    }
}

fn read_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(BASE64.encode(bytes))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn index_body(image: String, external_id: String, max_faces: Option<u32>) -> Value {
    let mut body = json!({
        "Image": { "Bytes": image },
        "ExternalImageId": external_id,
    });
    if let Some(n) = max_faces {
        body["MaxFaces"] = json!(n);
    }
    body
}

fn search_body(image: String, threshold: Option<f32>, max_faces: Option<u32>) -> Value {
    let mut body = json!({ "Image": { "Bytes": image } });
    if let Some(t) = threshold {
        body["FaceMatchThreshold"] = json!(t);
    }
    if let Some(n) = max_faces {
        body["MaxFaces"] = json!(n);
    }
    body
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let daemon = Daemon::new(&cli.url);

    let response = match cli.command {
        Commands::Health => daemon.call(Method::GET, "/health", None).await?,
        Commands::Create { collection } => {
            let body = json!({ "CollectionId": collection });
            daemon.call(Method::POST, "/collections", Some(body)).await?
        }
        Commands::Delete { collection } => {
            let path = format!("/collections/{collection}");
            daemon.call(Method::DELETE, &path, None).await?
        }
        Commands::List => daemon.call(Method::GET, "/collections", None).await?,
        Commands::Describe { collection } => {
            let path = format!("/collections/{collection}");
            daemon.call(Method::GET, &path, None).await?
        }
        Commands::Faces {
            collection,
            max_results,
        } => {
            let mut path = format!("/collections/{collection}/faces");
            if let Some(n) = max_results {
                path.push_str(&format!("?MaxResults={n}"));
            }
            daemon.call(Method::GET, &path, None).await?
        }
        Commands::Index {
            collection,
            image,
            external_id,
            max_faces,
        } => {
            let label = external_id.unwrap_or_else(|| file_label(&image));
            let body = index_body(read_image(&image)?, label, max_faces);
            let path = format!("/collections/{collection}/index-faces");
            daemon.call(Method::POST, &path, Some(body)).await?
        }
        Commands::Search {
            collection,
            image,
            threshold,
            max_faces,
        } => {
            let body = search_body(read_image(&image)?, threshold, max_faces);
            let path = format!("/collections/{collection}/search-faces-by-image");
            daemon.call(Method::POST, &path, Some(body)).await?
        }
        Commands::Extract { image } => {
            let body = json!({ "image": read_image(&image)? });
            daemon.call(Method::POST, "/extract", Some(body)).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
