use clap::{Parser, Subcommand};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "confctl")]
#[command(about = "Command-line client for dockerd-config-manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8888")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon state, versions and config file info
    Status,
    /// Print the live dockerd.json
    Show,
    /// Editable fields and the protected summary
    Preview,
    /// Replace the registry mirror list (no arguments clears it)
    SetMirrors { mirrors: Vec<String> },
    /// List backups, newest first
    Backups,
    /// Snapshot the live configuration now
    Backup,
    /// Restore a backup over the live configuration
    Restore { id: String },
    /// Delete a backup
    Delete { id: String },
    /// Restart the daemon and follow its log
    Restart {
        /// Use the slower package-manager restart
        #[arg(long)]
        fallback: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let api = |method: Method, path: &str| -> RequestBuilder {
        client.request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
    };

    let res = match cli.command {
        Commands::Status => api(Method::GET, "/api/status").send().await?,
        Commands::Show => api(Method::GET, "/api/config").send().await?,
        Commands::Preview => api(Method::GET, "/api/config/preview").send().await?,
        Commands::SetMirrors { mirrors } => {
            api(Method::PUT, "/api/config")
                .json(&json!({ "edits": { "registry-mirrors": mirrors } }))
                .send()
                .await?
        }
        Commands::Backups => api(Method::GET, "/api/backups").send().await?,
        Commands::Backup => api(Method::POST, "/api/backups").send().await?,
        Commands::Restore { id } => {
            api(Method::POST, &format!("/api/backups/{}/restore", id))
                .send()
                .await?
        }
        Commands::Delete { id } => {
            api(Method::DELETE, &format!("/api/backups/{}", id))
                .send()
                .await?
        }
        Commands::Restart { fallback } => {
            let res = api(Method::POST, "/api/restart")
                .json(&json!({ "fallback": fallback }))
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            return follow_log(api(Method::GET, "/api/restart/stream")).await;
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Print SSE `data:` lines until the stream terminator arrives.
async fn follow_log(req: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let mut res = req.send().await?;
    let mut pending = String::new();
    while let Some(chunk) = res.chunk().await? {
        pending.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            if let Some(data) = line.trim_end().strip_prefix("data:") {
                let data = data.trim_start();
                if data == "[DONE]" {
                    return Ok(());
                }
                println!("{}", data);
            }
        }
    }
    Ok(())
}
