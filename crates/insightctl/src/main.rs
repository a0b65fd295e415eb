//! insightctl - command-line client for the Grant Insight daemon.
//!
//! Fetches a nonce, sends a consult or search request, and prints the
//! reply fields. Useful for smoke-testing a running daemon.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "insightctl", version, about = "Grant Insight daemon client")]
struct Args {
    /// Daemon base URL.
    #[arg(long, default_value = "http://127.0.0.1:7867")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a consultation message.
    Consult {
        message: String,
        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
        /// Context hint: business type.
        #[arg(long)]
        business_type: Option<String>,
    },
    /// Search for grants.
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },
    /// Check daemon health.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();

    match args.command {
        Command::Consult {
            message,
            conversation,
            business_type,
        } => {
            let nonce = fetch_nonce(&client, &args.server).await?;
            let mut context = serde_json::Map::new();
            if let Some(bt) = business_type {
                context.insert("business_type".to_string(), Value::String(bt));
            }
            let body = json!({
                "nonce": nonce,
                "message": message,
                "conversation_id": conversation,
                "context": context,
            });
            let data = post_envelope(&client, &args.server, "/v1/consult", &body).await?;
            print_consult(&data);
        }
        Command::Search {
            query,
            category,
            page,
            per_page,
        } => {
            let nonce = fetch_nonce(&client, &args.server).await?;
            let body = json!({
                "nonce": nonce,
                "query": query,
                "filters": { "category": category },
                "page": page,
                "per_page": per_page,
            });
            let data = post_envelope(&client, &args.server, "/v1/search", &body).await?;
            print_search(&data);
        }
        Command::Health => {
            let response: Value = client
                .get(format!("{}/v1/health", args.server))
                .send()
                .await
                .context("daemon unreachable")?
                .json()
                .await?;
            println!(
                "status: {}  version: {}  uptime: {}s",
                response["data"]["status"].as_str().unwrap_or("?"),
                response["data"]["version"].as_str().unwrap_or("?"),
                response["data"]["uptime_secs"].as_u64().unwrap_or(0),
            );
        }
    }

    Ok(())
}

async fn fetch_nonce(client: &reqwest::Client, server: &str) -> Result<String> {
    let response: Value = client
        .get(format!("{}/v1/nonce", server))
        .send()
        .await
        .context("daemon unreachable")?
        .json()
        .await?;
    response["data"]["nonce"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("daemon did not issue a nonce"))
}

async fn post_envelope(
    client: &reqwest::Client,
    server: &str,
    path: &str,
    body: &Value,
) -> Result<Value> {
    let envelope: Value = client
        .post(format!("{}{}", server, path))
        .json(body)
        .send()
        .await
        .context("daemon unreachable")?
        .json()
        .await?;

    if envelope["success"] == Value::Bool(true) {
        Ok(envelope["data"].clone())
    } else {
        Err(anyhow!(
            "request rejected: {}",
            envelope["data"].as_str().unwrap_or("unknown error")
        ))
    }
}

fn print_consult(data: &Value) {
    println!("{}", data["message"].as_str().unwrap_or(""));
    println!("  conversation: {}", data["conversation_id"].as_str().unwrap_or("?"));
    println!("  confidence:   {:.2}", data["confidence"].as_f64().unwrap_or(0.0));

    if let Some(suggestions) = data["suggestions"].as_array() {
        for s in suggestions {
            println!("  → {}", s.as_str().unwrap_or(""));
        }
    }
    if let Some(grants) = data["related_grants"].as_array() {
        if !grants.is_empty() {
            println!("  related grants:");
            for g in grants {
                println!(
                    "    {} (score {})",
                    g["title"].as_str().unwrap_or("?"),
                    g["relevance_score"].as_u64().unwrap_or(0)
                );
            }
        }
    }
}

fn print_search(data: &Value) {
    println!(
        "{} hits (page {}/{}{})",
        data["total_found"].as_u64().unwrap_or(0),
        data["page"].as_u64().unwrap_or(1),
        data["per_page"].as_u64().unwrap_or(0),
        if data["has_more"] == Value::Bool(true) {
            ", more available"
        } else {
            ""
        },
    );
    println!("{}", data["insights"].as_str().unwrap_or(""));

    if let Some(results) = data["results"].as_array() {
        for r in results {
            println!(
                "  [{}] {}  最大{}万円  締切 {}",
                r["relevance_score"].as_u64().unwrap_or(0),
                r["title"].as_str().unwrap_or("?"),
                r["meta"]["max_amount"].as_u64().unwrap_or(0),
                r["meta"]["deadline"].as_str().unwrap_or("未定"),
            );
        }
    }
    if let Some(suggestions) = data["search_suggestions"].as_array() {
        if !suggestions.is_empty() {
            let terms: Vec<&str> = suggestions.iter().filter_map(|s| s.as_str()).collect();
            println!("  related terms: {}", terms.join(", "));
        }
    }
}
