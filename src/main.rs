use env_logger::{Builder, WriteStyle};
use std::env;
use telesync::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // An optional first argument overrides ./config.ini
    let loaded = match env::args().nth(1) {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::new(),
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("Using default configuration: {:#}", e);
        AppConfig::default()
    });

    // RUST_LOG, when set, wins over the configured level
    Builder::new()
        .filter_level(config.get_log_level())
        .parse_default_env()
        .write_style(WriteStyle::Auto)
        .format_timestamp_millis()
        .init();

    telesync::run(config).await
}
