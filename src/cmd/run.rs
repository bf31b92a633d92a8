//! Report generation and smartview listing commands.

use anyhow::{Context, Result};

use reportflow::config::Config;
use reportflow::generation::{HttpGenerationBackend, LoopParams, cancellation};
use reportflow::orchestrator::WorkflowOrchestrator;
use reportflow::session::{LongTextStrategy, SessionService, SessionStore};
use reportflow::smartview::{HttpSmartviewSource, list_smartviews};
use reportflow::workflow::Step;

pub async fn cmd_smartviews(config: &Config) -> Result<()> {
    let api_key = config
        .airsaas_api_key
        .clone()
        .context("AIRSAAS_API_KEY is not set")?;
    let source = HttpSmartviewSource::new(config.airsaas_url.clone(), api_key);
    let views = list_smartviews(&source, config.smartview_page_cap).await?;

    if views.is_empty() {
        println!("No project smartviews available.");
        return Ok(());
    }

    println!("{} smartviews:", views.len());
    for view in &views {
        let visibility = if view.private { "private" } else { "shared" };
        println!("  {}  {} ({})", view.id, view.name, visibility);
        if let Some(description) = &view.description {
            if !description.is_empty() {
                println!("      {description}");
            }
        }
    }
    Ok(())
}

pub async fn cmd_run(
    config: &Config,
    strategy: LongTextStrategy,
    max_iterations: Option<u32>,
    threshold: Option<u8>,
) -> Result<()> {
    let store = SessionStore::new(config.state_file.clone());
    let service = SessionService::new(config.backend_url.clone(), config.backend_key.clone());
    let mut orchestrator = WorkflowOrchestrator::new(store, service);

    // Pick up where the server says this session left off.
    orchestrator.resume().await?;
    if orchestrator.current_step() == Step::LongTextOptions {
        orchestrator.choose_strategy(strategy).await?;
    }
    if orchestrator.current_step() != Step::Generating {
        anyhow::bail!(
            "session is at step '{}'; complete the earlier steps before running generation",
            orchestrator.current_step()
        );
    }

    let params = LoopParams {
        max_iterations: max_iterations.unwrap_or(config.max_iterations),
        threshold: threshold.unwrap_or(config.threshold),
    };
    let backend = HttpGenerationBackend::new(config.backend_url.clone(), config.backend_key.clone());

    let (cancel_tx, cancel_rx) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = orchestrator
        .run(&backend, &backend, strategy, params, &cancel_rx)
        .await?;

    match &outcome {
        reportflow::generation::GenerationOutcome::Accepted {
            artifact_id,
            score,
            iterations_used,
        } => {
            println!(
                "Report accepted: {} (score {}, {} iteration{})",
                artifact_id,
                score,
                iterations_used,
                if *iterations_used == 1 { "" } else { "s" }
            );
        }
        reportflow::generation::GenerationOutcome::AcceptedWithWarning {
            artifact_id,
            score,
            iterations_used,
        } => {
            println!(
                "{} best candidate {} scored {} after {} iterations, below the threshold of {}",
                console::style("Warning:").yellow().bold(),
                artifact_id,
                score,
                iterations_used,
                params.threshold
            );
        }
    }
    Ok(())
}
