//! tws-probe
//!
//! Connects to a TWS/Gateway socket endpoint, prints what the handshake
//! negotiated, optionally subscribes to market data for one symbol, and
//! streams every event until Ctrl+C or until the server drops the session.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, Notify};

use tws_wire::{Contract, IBClient, IBEvent};

/// Command-line probe for a TWS/Gateway socket endpoint.
#[derive(Parser, Debug)]
#[command(name = "tws-probe", version)]
struct Args {
    /// TWS/Gateway host (empty means 127.0.0.1)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// TWS/Gateway port
    #[arg(long, default_value_t = 7496)]
    port: u16,

    /// Client id sent during the handshake
    #[arg(long = "client-id", default_value_t = 0)]
    client_id: i32,

    /// Stock symbol to subscribe to
    #[arg(long)]
    symbol: Option<String>,

    /// Destination exchange for --symbol
    #[arg(long, default_value = "SMART")]
    exchange: String,

    /// Currency for --symbol
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Print events as JSON lines instead of debug text
    #[arg(long)]
    json: bool,
}

const TICKER_ID: i32 = 1;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let (client, rx) = IBClient::new();

    println!(
        "Connecting to {}:{} (client ID: {})...",
        args.host, args.port, args.client_id
    );
    if let Err(e) = client.connect(&args.host, args.port, args.client_id).await {
        eprintln!("Failed to connect: {e}");
        eprintln!("Please ensure:");
        eprintln!("  1. TWS or IB Gateway is running");
        eprintln!("  2. API socket clients are enabled in its configuration");
        eprintln!("  3. The host and port are correct");
        std::process::exit(1);
    }

    println!("Server version: {}", client.server_version());
    match (client.connection_time(), client.connection_time_parsed()) {
        (Some(raw), Some(parsed)) => println!("Server time:    {raw} ({parsed})"),
        (Some(raw), None) => println!("Server time:    {raw}"),
        _ => {}
    }

    if let Some(symbol) = &args.symbol {
        let contract = Contract::stock(symbol, &args.exchange, &args.currency);
        match client.req_mkt_data(TICKER_ID, &contract).await {
            Ok(()) => tracing::info!(symbol, ticker_id = TICKER_ID, "market data requested"),
            Err(e) => tracing::warn!(symbol, "market data request failed: {e}"),
        }
    }

    let shutdown = Arc::new(Notify::new());
    let notify = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, shutting down...");
        notify.notify_one();
    }) {
        tracing::warn!("could not install Ctrl+C handler: {e}");
    }

    let closed = tokio::select! {
        closed = print_events(rx, args.json) => closed,
        _ = shutdown.notified() => false,
    };

    if closed {
        println!("Server closed the connection.");
    } else {
        if args.symbol.is_some() {
            let _ = client.cancel_mkt_data(TICKER_ID).await;
        }
        client.disconnect().await;
    }
    println!("Goodbye!");
}

/// Print events until the session ends. Returns `true` if it ended with
/// `ConnectionClosed`.
async fn print_events(mut rx: mpsc::UnboundedReceiver<IBEvent>, json: bool) -> bool {
    while let Some(event) = rx.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("could not serialize event: {e}"),
            }
        } else {
            println!("{event:?}");
        }
        if event == IBEvent::ConnectionClosed {
            return true;
        }
    }
    false
}
