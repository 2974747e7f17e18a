use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "stream-cli")]
#[command(about = "Management CLI for the stream ledger bridge", long_about = None)]
struct Cli {
    #[arg(short, long, env = "STREAM_LEDGER_API_URL", default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check bridge status
    Status,
    /// Confirmed comments, newest first
    Feed,
    /// Comments waiting for confirmation
    Pending,
    /// Contract balance
    Balance,
    /// Show the current channel, or switch to a new one
    Channel { name: Option<String> },
    /// Submit a reaction for the current channel
    React { reaction: String },
    /// Mint a stream moment for the current channel
    Mint { metadata: String },
    /// Donate from the external wallet (amount in ether)
    Donate { amount: String },
    /// Connect the external wallet
    Connect,
    /// Explorer URL for a transaction reference
    TxUrl { reference: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/health")),
        Commands::Feed => client.get(format!("{base}/feed")),
        Commands::Pending => client.get(format!("{base}/pending")),
        Commands::Balance => client.get(format!("{base}/balance")),
        Commands::Channel { name: None } => client.get(format!("{base}/channel")),
        Commands::Channel { name: Some(channel) } => client
            .post(format!("{base}/channel"))
            .json(&json!({ "channel": channel })),
        Commands::React { reaction } => client
            .post(format!("{base}/reactions"))
            .json(&json!({ "reaction": reaction })),
        Commands::Mint { metadata } => client
            .post(format!("{base}/moments"))
            .json(&json!({ "metadata": metadata })),
        Commands::Donate { amount } => client
            .post(format!("{base}/donations"))
            .json(&json!({ "amount": amount })),
        Commands::Connect => client.post(format!("{base}/wallet/connect")),
        Commands::TxUrl { reference } => client.get(format!("{base}/tx/{reference}")),
    };

    print_response(request.send().await?).await
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
