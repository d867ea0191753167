//! Human and JSON rendering of workflow results.

use colored::Colorize;
use postforge_orchestrator::{AgentError, WorkflowResult, WorkflowStatus};
use serde_json::{Value, json};

/// JSON report for one topic.
pub fn report(topic: &str, result: &Result<WorkflowResult, AgentError>) -> Value {
    match result {
        Ok(result) => serde_json::to_value(result).unwrap_or_else(|e| {
            json!({
                "topic": topic,
                "status": "failed",
                "error": { "kind": "internal", "message": format!("failed to serialize result: {e}") },
            })
        }),
        Err(e) => json!({
            "topic": topic,
            "status": "failed",
            "error": { "kind": e.kind(), "message": e.to_string() },
        }),
    }
}

/// Prints one topic's result for a terminal.
pub fn print_human(topic: &str, result: &Result<WorkflowResult, AgentError>) {
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            println!("{} {}", topic.bold(), "[FAILED]".red().bold());
            println!("  {} {e}", "✗".red());
            println!();
            return;
        }
    };

    let badge = match result.status {
        WorkflowStatus::Success => "[SUCCESS]".green().bold(),
        WorkflowStatus::Partial => "[PARTIAL]".yellow().bold(),
        WorkflowStatus::Failed => "[FAILED]".red().bold(),
    };
    println!("{} {badge}", topic.bold());

    let state = &result.state;
    if let Some(content) = state.content() {
        let truncated = if content.truncated { ", truncated" } else { "" };
        println!(
            "  {} ({}, {} chars{truncated})",
            "Post".bold(),
            content.platform,
            content.char_count
        );
        for line in content.text.lines() {
            println!("    {line}");
        }
        if !content.hashtags.is_empty() {
            println!("  {} {}", "Hashtags".bold(), content.hashtags.join(" ").cyan());
        }
    }

    if let Some(research) = state.research() {
        println!("  {}", "Facts".bold());
        for (i, fact) in research.facts().iter().enumerate() {
            let source = fact.source().map(|s| format!(" ({s})")).unwrap_or_default();
            println!(
                "    {}. [{:.2}] {}{}",
                i + 1,
                fact.relevance(),
                fact.text(),
                source.dimmed()
            );
        }
    }

    if let Some(image) = state.image() {
        let location = image
            .local_path
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| image.url().map(str::to_string))
            .unwrap_or_default();
        println!("  {} {}", "Image".bold(), location.cyan());
    }

    if let Some(error) = state.error() {
        let marker = if result.is_partial() { "⚠".yellow() } else { "✗".red() };
        println!("  {marker} {error}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_for_rejected_parameters() {
        let err = AgentError::Validation("unsupported platform: myspace".to_string());
        let value = report("solar", &Err(err));
        assert_eq!(value["topic"], "solar");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"]["kind"], "validation");
        assert!(value["error"]["message"].as_str().unwrap().contains("myspace"));
    }
}
