//! Binary entry point logic

use crate::app::boot::Boot;
use crate::app::cli::Args;
use crate::app::context::AppContext;
use crate::app::error::{AppError, AppResult};
use crate::core::config::Config;
use crate::core::logging::init_logging;
use crate::core::shutdown::Shutdown;
use crate::core::version::banner;
use clap::Parser;

/// Parse arguments, load configuration, then run until a shutdown signal
pub async fn startup() -> AppResult<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config_file.as_deref())?;
    args.apply_to(&mut config);
    config.validate()?;

    init_logging(
        Some(&config.log.level),
        Some(&config.log.format),
        config.log.file.as_deref(),
        args.use_color(),
    )
    .map_err(|e| AppError::Logging {
        message: e.to_string(),
    })?;
    log::info!("{}", banner());

    if args.check {
        log::info!(
            "Configuration is valid: {} registries, {} tasks",
            config.registries.len(),
            config.tasks.len()
        );
        return Ok(());
    }

    run(AppContext::from_config(config)?).await
}

/// Run the managers over `context` until shutdown is requested
pub async fn run(context: AppContext) -> AppResult<()> {
    let shutdown = Shutdown::new();
    shutdown.install_signal_handlers();

    let boot = Boot::new(&context);
    boot.start().await?;
    log::info!(
        "Running with the {} adapter; waiting for shutdown signal",
        context.adapter.kind()
    );

    shutdown.requested().await;
    log::info!("Draining");
    boot.stop().await
}
