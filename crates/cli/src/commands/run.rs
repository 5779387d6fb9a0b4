//! `taskweave run`: run a configured agent on a task.

use std::io::Write;
use std::sync::Arc;

use taskweave_config::AppConfig;
use taskweave_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::runtime::{Runtime, build_catalog, final_result};

pub async fn run(
    agent: String,
    task: String,
    max_iterations: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let known: Vec<String> = config.agents.iter().map(|a| a.name.clone()).collect();
    let Some(def) = config.agents.iter_mut().find(|a| a.name == agent) else {
        return Err(format!(
            "Unknown agent '{agent}'. Configured agents: {}",
            known.join(", ")
        )
        .into());
    };
    if let Some(n) = max_iterations {
        if n == 0 {
            return Err("--max-iterations must be > 0".into());
        }
        def.max_iterations = Some(n);
    }

    let provider = taskweave_providers::build_from_config(&config.provider).map_err(|e| {
        format!(
            "{e}\n  Set TASKWEAVE_API_KEY or add api_key to {}",
            AppConfig::config_path().display()
        )
    })?;

    tracing::debug!(
        agent = %agent,
        provider = %config.provider.name,
        model = %config.provider.model,
        "Assembling runtime"
    );
    let bus = Arc::new(EventBus::default());
    let progress = tokio::spawn(render_progress(bus.subscribe(), std::io::stderr()));

    let catalog = build_catalog(&bus)?;
    let runtime = Runtime::assemble(&config, &catalog, provider, bus)?;

    eprintln!("  {agent} is working on the task...");
    let report = runtime
        .run(&agent, &task)
        .await
        .ok_or_else(|| format!("Agent '{agent}' is not registered"))?;

    // Dropping every bus handle closes the channel once the renderer drains it.
    drop(runtime);
    drop(catalog);
    if let Err(e) = progress.await {
        tracing::debug!(error = %e, "Progress renderer stopped early");
    }

    println!();
    println!("{}", final_result(&report.memory).unwrap_or_default());
    println!();
    println!(
        "  Run {} after {} iteration(s), {} memory item(s)",
        report.exit,
        report.iterations,
        report.memory.len()
    );

    Ok(())
}

/// One progress line for the events worth showing.
fn progress_line(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::CapabilityExecuted {
            agent,
            capability,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "ok" } else { "failed" };
            Some(format!("  [{agent}] {capability} {mark} ({duration_ms} ms)"))
        }
        DomainEvent::DelegationCompleted { agent, success, .. } => {
            let mark = if *success { "returned" } else { "failed" };
            Some(format!("  -> delegate {agent} {mark}"))
        }
        _ => None,
    }
}

/// Write progress lines to `out` until every publisher is gone.
async fn render_progress<W: Write>(mut rx: broadcast::Receiver<Arc<DomainEvent>>, mut out: W) -> W {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(line) = progress_line(&event)
                    && writeln!(out, "{line}").is_err()
                {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    out
}
