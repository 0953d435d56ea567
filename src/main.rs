use anyhow::Result;
use colored::Colorize;
use option_chain_stream::app_config::AppConfig;
use option_chain_stream::chain::commands::ChainCommands;
use option_chain_stream::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to the console and ./logs; keep running if the file layer fails
    if let Err(e) = logging::init_logging() {
        eprintln!("{} Logging disabled: {:#}", "⚠".yellow(), e);
    }

    // ========================================
    // CONFIGURATION - from environment
    // ========================================

    let app = AppConfig::from_env();
    app.log_config();

    if let Err(e) = app.validate() {
        eprintln!("{} {}", "✗".red(), e);
        ChainCommands::print_usage();
        std::process::exit(1);
    }

    // ========================================

    match app.mode.as_str() {
        "stream" => ChainCommands::run_stream(&app).await?,
        "expiries" => ChainCommands::run_expiries(&app).await?,
        "server" => ChainCommands::run_server(&app).await?,
        _ => {
            ChainCommands::print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
