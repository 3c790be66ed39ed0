// Copyright 2025 Finstore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use finstore::auth::StaticAuth;
use finstore::config::load_config_with_env;
use finstore::document;
use finstore::store::AdapterFactory;

/// Finstore - inspect and edit documents on the configured storage backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Principal id (overrides config file)
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a single document
    Get { path: String },
    /// Insert a document with a backend-assigned id
    Add { path: String, json: String },
    /// Create or merge a document at a caller-assigned id
    Set { path: String, json: String },
    /// Partially update an existing document
    Update { path: String, json: String },
    /// Delete a document (idempotent)
    Delete { path: String },
    /// Subscribe to a collection and print snapshots
    Watch {
        path: String,
        /// Number of snapshots to print before cancelling
        #[arg(long, default_value_t = 3)]
        snapshots: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config_with_env(&args.config)?;
    if let Some(user) = args.user {
        config.auth.user_id = Some(user);
    }

    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Loaded configuration from: {:?}", args.config);
    info!("Storage backend: {}", config.store.backend);

    let auth = Arc::new(StaticAuth::new(
        config.auth.user_id.clone(),
        config.auth.bearer_token.clone(),
    ));
    let adapter = AdapterFactory::create(&config.store, auth)?;
    adapter.initialize().await?;

    match args.command {
        Command::Get { path } => {
            match adapter.get_one(&path).await? {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
                None => println!("null"),
            }
        }
        Command::Add { path, json } => {
            let data = document::from_value(serde_json::from_str(&json)?)?;
            let id = adapter.add(&path, data).await?;
            println!("{id}");
        }
        Command::Set { path, json } => {
            let data = document::from_value(serde_json::from_str(&json)?)?;
            adapter.set(&path, data).await?;
        }
        Command::Update { path, json } => {
            let data = document::from_value(serde_json::from_str(&json)?)?;
            adapter.update(&path, data).await?;
        }
        Command::Delete { path } => {
            adapter.delete(&path).await?;
        }
        Command::Watch { path, snapshots } => {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let callback = Arc::new(move |docs: Vec<document::Document>| {
                let _ = tx.send(docs);
            });

            let subscription = adapter.subscribe(&path, callback, &[]).await?;
            let mut seen = 0;
            while seen < snapshots {
                tokio::select! {
                    Some(docs) = rx.recv() => {
                        println!("{}", serde_json::to_string_pretty(&docs)?);
                        seen += 1;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                        break;
                    }
                }
            }
            subscription.cancel();
        }
    }

    Ok(())
}
