use clap::Parser;

use relay_server::{ServerConfig, Topology};

/// Real-time event relay server.
#[derive(Parser, Debug)]
#[command(name = "relay", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 1234)]
    port: u16,

    /// HTTP path of the WebSocket upgrade endpoint.
    #[arg(long, default_value = "/ws")]
    ws_path: String,

    /// Inbound routing mode: "echo" or "command".
    #[arg(long, default_value = "echo")]
    topology: String,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let topology: Topology = args
        .topology
        .parse()
        .expect("topology must be 'echo' or 'command'");

    let config = ServerConfig {
        port: args.port,
        ws_path: args.ws_path,
        topology,
    };

    let handle = relay_server::start(config)
        .await
        .expect("Failed to bind listener");

    tracing::info!(port = handle.port, "relay ready");

    // Exiting drops connections without a drain handshake.
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
