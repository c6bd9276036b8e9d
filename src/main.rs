use calcnest::lib::config::ServiceConfig;
use calcnest::lib::service;
use tracing::{error, Level};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let served = match ServiceConfig::from_env() {
        Ok(config) => service::serve(config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = served {
        error!("{e:#}");
        std::process::exit(1);
    }
}
