use clap::Parser;
use tracing::{info, info_span, Level};
use tracing_subscriber::EnvFilter;

use campusrelay::fabric::lb::{self, LbSettings};

/// The classroom relay load balancer: accepts client connections and fans
/// them out across a hot-reloadable set of application server backends.
#[derive(Parser, Debug)]
#[command(name = "lb", about = "Classroom relay load balancer")]
struct Args {
    /// Config file name searched for in the cwd, its ancestors, and the
    /// usual per-user/system config locations.
    #[arg(long, default_value = "lb.json")]
    config: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    health_check_timeout_secs: Option<f64>,

    #[arg(long)]
    servers_file: Option<String>,
}

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let _span = info_span!("startup").entered();

    let args = Args::parse();
    let mut settings = lb::load_lb_config(&args.config).expect("could not load load balancer config");

    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(t) = args.health_check_timeout_secs {
        settings.health_check_timeout_secs = t;
    }
    if let Some(f) = args.servers_file {
        settings.servers_file = f;
    }

    lb::validate(&settings).expect("invalid load balancer configuration");

    info!(?settings, "starting load balancer");
    drop(_span);

    if let Err(e) = lb::run(settings).await {
        tracing::error!(error = %e, "load balancer exited with error");
        std::process::exit(1);
    }
}
