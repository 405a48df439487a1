use ensembl_metadata_grpc::config::AppConfig;
use ensembl_metadata_grpc::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={} health={} allow_unreleased={}",
        config.server_address(),
        config.health_address(),
        config.allow_unreleased
    );

    run_server(config).await
}
