use std::sync::Arc;

use clap::Parser;
use tracing::{info, info_span, Level};
use tracing_subscriber::EnvFilter;

use campusrelay::fabric::server::collaborators::{InMemoryAuthStore, InMemoryRoomStore};
use campusrelay::fabric::server::{self, ClientDirectory, ServerSettings};

/// The classroom relay application server: terminates the framed protocol
/// on each LB connection and dispatches typed requests to handlers.
#[derive(Parser, Debug)]
#[command(name = "appserver", about = "Classroom relay application server")]
struct Args {
    #[arg(long, default_value = "appserver.json")]
    config: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let _span = info_span!("startup").entered();

    let args = Args::parse();
    let mut settings = server::load_server_config(&args.config).expect("could not load application server config");

    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(db_path) = args.db_path {
        settings.db_path = db_path;
    }

    let directory = ClientDirectory::open(&settings.db_path).expect("could not open client directory store");
    let auth = Arc::new(InMemoryAuthStore::default());
    let rooms = Arc::new(InMemoryRoomStore::default());

    info!(?settings, "starting application server");
    drop(_span);

    if let Err(e) = server::run(settings, directory, auth, rooms).await {
        tracing::error!(error = %e, "application server exited with error");
        std::process::exit(1);
    }
}
