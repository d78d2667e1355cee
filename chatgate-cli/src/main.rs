use chatgate_core::{SimulatedClientFactory, DEFAULT_MESSAGE_LIMIT};
use chatgate_http::{start_server, ServerConfig};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Clone, Debug)]
#[command(name = "chatgate", version, about = "Session gateway for messaging clients")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "CHATGATE_ADDRESS", default_value = "127.0.0.1:3000")]
    address: String,

    /// Maximum number of concurrent sessions (unlimited when absent)
    #[arg(long, env = "CHATGATE_MAX_SESSIONS")]
    max_sessions: Option<usize>,

    /// Seconds to wait for each of logout and destroy when a session stops
    #[arg(long, env = "CHATGATE_TEARDOWN_TIMEOUT_SECS", default_value_t = 10)]
    teardown_timeout_secs: u64,

    /// Messages returned when a request has no usable limit
    #[arg(long, env = "CHATGATE_DEFAULT_LIMIT", default_value_t = DEFAULT_MESSAGE_LIMIT)]
    default_limit: usize,

    /// Simulated backend: report sessions ready this many ms after the QR is issued
    #[arg(long, env = "CHATGATE_AUTO_READY_AFTER_MS")]
    auto_ready_after_ms: Option<u64>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.address.clone())
            .with_max_sessions(self.max_sessions)
            .with_teardown_timeout(Duration::from_secs(self.teardown_timeout_secs))
            .with_default_message_limit(self.default_limit.max(1))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatgate=info,chatgate_core=info,chatgate_http=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    info!("chatgate {} starting with {:?}", env!("CARGO_PKG_VERSION"), cli);
    let factory = SimulatedClientFactory::new()
        .with_auto_ready(cli.auto_ready_after_ms.map(Duration::from_millis));

    start_server(cli.server_config(), Arc::new(factory)).await?;
    Ok(())
}
