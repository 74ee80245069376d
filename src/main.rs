use anyhow::{Context, Result};
use log::LevelFilter;
use tokio::runtime::Runtime;

use outline_reader_mcp::config::ReaderConfig;
use outline_reader_mcp::mcp_handler;

const LOG_FILE_ENV: &str = "OUTLINE_READER_LOG_FILE";
const LOG_LEVEL_ENV: &str = "OUTLINE_READER_LOG_LEVEL";

/// Logs go to stderr (stdout carries the MCP protocol), plus a file when configured.
fn init_logging() -> Result<()> {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| raw.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            let log_file = fern::log_file(&path)
                .with_context(|| format!("Failed to open log file: {}", path))?;
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] {}: {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .level(level)
                .chain(std::io::stderr())
                .chain(log_file)
                .apply()
                .context("Failed to install logger")?;
        }
        _ => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .target(env_logger::Target::Stderr)
                .init();
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let config = ReaderConfig::load().context("Failed to load configuration")?;
    log::info!(
        "Starting outline reader (max depth {:?}, collapse {}, cache {} trees)",
        config.default_max_depth,
        config.default_collapse_chains,
        config.cache_capacity
    );

    // Create a Tokio runtime for async operations
    let rt = Runtime::new()?;

    rt.block_on(mcp_handler::start_server(config))?;

    Ok(())
}
