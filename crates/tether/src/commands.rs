//! Command implementations

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use tether_agent::{AgentLoop, StopReason};
use tether_bus::{spawn_stdout_writer, Outbound, Transport};
use tether_config::Config;
use tether_provider::OpenAiProvider;

use crate::Cli;

/// Resolve configuration: file, then `.env` and process environment, then flags
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().await.context("Failed to load config")?,
    };

    if let Ok(path) = dotenvy::dotenv() {
        debug!("loaded environment from {:?}", path);
    }
    config.apply_env();

    if let Some(steps) = cli.max_steps {
        anyhow::ensure!(steps > 0, "--max-steps must be at least 1");
        config.agent.max_steps = steps;
    }
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }

    Ok(config)
}

/// Serve one session over stdio
pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            report_setup_failure(&e).await;
            return Err(e);
        }
    };

    if !config.has_api_key() {
        info!("no API key configured, model calls will report unavailable");
    }
    let provider = OpenAiProvider::from_config(&config.provider);

    let (transport, writer) = Transport::stdio();
    let outcome = AgentLoop::new(provider, transport, &config).run().await;

    match outcome.reason {
        StopReason::Answered => info!("session answered in {} steps", outcome.steps),
        StopReason::StepsExhausted => info!("session ran out of steps"),
        StopReason::Aborted => info!("session aborted: {}", outcome.answer),
    }

    writer
        .await
        .context("stdout writer panicked")?
        .context("Failed to write to stdout")?;

    Ok(())
}

/// Tell the host why no session will run. The host still gets its one
/// `final` message before the process exits non-zero.
async fn report_setup_failure(err: &anyhow::Error) {
    let (transport, _lines, outbound) = Transport::channels();
    let writer = spawn_stdout_writer(outbound);
    transport.send(Outbound::final_answer(
        format!("Agent setup failed: {:#}", err),
        Vec::new(),
    ));
    drop(transport);

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("could not report setup failure: {}", e),
        Err(e) => warn!("stdout writer panicked: {}", e),
    }
}
