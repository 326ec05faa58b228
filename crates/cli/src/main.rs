use clap::Parser;
use danse_domain::CliOverrides;
use danse_infrastructure::dns::DnsServerHandler;
use tracing::{error, info};

mod bootstrap;
mod di;
mod server;

#[derive(Parser)]
#[command(name = "danse")]
#[command(version)]
#[command(about = "danse - local DNS proxy forwarding to DoH, DoT and DNSCrypt upstreams")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Bind address (ip:port)
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        bind_address: cli.bind.clone(),
        log_level: cli.log_level.clone(),
        disable_cache: cli.no_cache,
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config)?;

    info!("Starting danse v{}", env!("CARGO_PKG_VERSION"));

    let dns_services = di::DnsServices::new(&config).await?;
    info!(
        upstream = dns_services.upstream.protocol_name(),
        cache = dns_services.cache.is_some(),
        "DNS services ready"
    );
    let handler = DnsServerHandler::new(dns_services.handler_use_case);

    tokio::select! {
        result = server::start_dns_server(&config.server.bind_address, handler) => {
            if let Err(e) = &result {
                error!(error = %e, "DNS server error");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
