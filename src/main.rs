use anyhow::Context;
use clap::Parser;

use urlshrt::config::{AppConfig, CliArgs};
use urlshrt::runtime::run_server;
use urlshrt::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid command-line arguments")?;

    // guard 必须存活到进程退出，否则缓冲的日志会丢失
    let _log_guard = init_logging(&config.logging)?;

    run_server(config).await
}
