//! Generate command implementation.
//!
//! Runs one workflow per topic and reports the results.

use anyhow::Context;
use colored::Colorize;
use postforge_orchestrator::{
    Orchestrator, PipelineConfig, RunOptions, WorkflowRequest, WorkflowStatus,
};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::render;
use crate::Args;

/// Execute the generate command.
///
/// Returns a failure exit code when any workflow failed. Partial results
/// (content without image) count as success.
pub async fn execute(args: Args) -> anyhow::Result<ExitCode> {
    let mut config =
        PipelineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(key) = &args.api_key {
        config.api_key = Some(key.clone());
    }
    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to set up the pipeline")?;

    if !args.json {
        println!("{}", "postforge".bold().cyan());
        println!(
            "  {} {} topic(s) for {} in a {} tone",
            "•".dimmed(),
            args.topics.len(),
            args.platform.as_str().cyan(),
            args.tone.as_str()
        );
        println!();
    }

    // One token for the whole batch so Ctrl+C stops every workflow.
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Cancellation requested, stopping workflows...", "⚠".yellow());
                cancel.cancel();
            }
        })
    };

    let requests: Vec<WorkflowRequest> =
        args.topics.iter().map(|topic| build_request(&args, topic, &cancel)).collect();
    info!(topics = requests.len(), concurrency = args.concurrency, "Running batch");
    let results = orchestrator.run_batch(requests, args.concurrency).await;
    ctrl_c.abort();

    let reports: Vec<serde_json::Value> = args
        .topics
        .iter()
        .zip(&results)
        .map(|(topic, result)| render::report(topic, result))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (topic, result) in args.topics.iter().zip(&results) {
            render::print_human(topic, result);
        }
    }

    if let Some(path) = &args.output {
        let body = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        if !args.json {
            println!("{} Results written to {}", "✓".green(), path.display());
        }
    }

    let failed = results
        .iter()
        .filter(|result| !matches!(result, Ok(r) if r.status != WorkflowStatus::Failed))
        .count();
    if failed > 0 {
        if !args.json {
            eprintln!("{} {failed} of {} workflow(s) failed", "✗".red(), results.len());
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn build_request(args: &Args, topic: &str, cancel: &CancellationToken) -> WorkflowRequest {
    let options = RunOptions {
        generate_image: !args.no_image,
        require_image: args.require_image,
        include_hashtags: !args.no_hashtags,
        call_to_action: args.call_to_action.clone(),
        cancel: cancel.clone(),
        events: None,
    };
    let request =
        WorkflowRequest::new(topic, args.platform.as_str(), args.tone.as_str(), args.max_facts)
            .with_options(options);
    match args.max_length {
        Some(len) => request.with_max_length(len),
        None => request,
    }
}
