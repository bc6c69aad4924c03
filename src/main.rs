use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use image_builder::{
    LogWriter, Subscribe, SupervisorBuilder, broker::AmqpBroker, config::AppConfig, logging,
    providers::Providers,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("image-builder: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&cfg.logger.level, cfg.logger.format) {
        eprintln!("image-builder: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cfg).await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "worker exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: AppConfig) -> Result<()> {
    info!(
        name = %cfg.app.name,
        version = %cfg.app.version,
        request_queue = %cfg.rabbitmq.request_queue,
        response_queue = %cfg.rabbitmq.response_queue,
        "starting image builder"
    );

    let providers = Providers::from_config(&cfg)
        .await
        .context("resolving providers")?;
    let broker = Arc::new(AmqpBroker::new(
        &cfg.rabbitmq.uri,
        &cfg.rabbitmq.request_queue,
        &cfg.rabbitmq.response_queue,
    ));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    SupervisorBuilder::new(cfg.supervisor.to_runtime(), broker, providers)
        .with_subscribers(subs)
        .build()
        .run()
        .await?;
    Ok(())
}
