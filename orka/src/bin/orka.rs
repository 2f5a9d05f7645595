//! CLI entrypoint: load a workflow document, run it against an optional
//! JSON input, and print the outcome. Scaled down from the upstream
//! orchestrator's `orchestrator-server` binary — no HTTP server, no
//! database, just the tracing-init-then-run shape that binary follows.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use orka::{build_error_report, build_trace, ExecutionStatus, Orchestrator, RuntimeDeps};
use orka_memory::InMemoryStore;
use serde_json::Value;

fn usage() -> String {
    "usage: orka <workflow.yaml> [input.json]".to_string()
}

async fn read_input(arg: Option<&str>) -> Value {
    match arg {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Err(_) => Value::String(path.to_string()),
        },
        None => Value::Null,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let mut args = std::env::args().skip(1);
    let Some(workflow_path) = args.next() else {
        eprintln!("{}", usage());
        return ExitCode::FAILURE;
    };
    let input_arg = args.next();

    let document = match orka::config::load_from_file(&workflow_path).await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::error!(error = %e, path = %workflow_path, "failed to load workflow");
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let store = InMemoryStore::new();
    let deps = RuntimeDeps::new(store.clone());
    let orchestrator = match Orchestrator::compile(&document, &deps).await {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "failed to compile workflow");
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let input = read_input(input_arg.as_deref()).await;
    tracing::info!(workflow = document.orchestrator.id, "starting run");
    let outcome = orchestrator.run(input).await;

    match outcome.execution_status {
        ExecutionStatus::Completed => {
            tracing::info!(run_id = %outcome.run_id, steps = outcome.logs.len(), "run completed");
            let body = serde_json::json!({"status": "completed", "run_id": outcome.run_id, "logs": outcome.logs});
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            ExitCode::SUCCESS
        }
        ExecutionStatus::Partial => {
            tracing::warn!(run_id = %outcome.run_id, errors = outcome.errors.len(), "run completed with errors");
            let report = build_error_report(&outcome, store.as_ref(), "in-memory").await;
            let body = serde_json::json!({"status": "partial", "run_id": outcome.run_id, "logs": outcome.logs, "telemetry": report});
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            ExitCode::SUCCESS
        }
        ExecutionStatus::Failed => {
            let report = build_error_report(&outcome, store.as_ref(), "in-memory").await;
            let trace = build_trace(&outcome, orka_memory::blob::DEFAULT_THRESHOLD_BYTES);
            let report_path = PathBuf::from(format!("{}.error_report.json", outcome.run_id));
            let trace_path = PathBuf::from(format!("{}.trace.json", outcome.run_id));

            let report_written = tokio::fs::write(&report_path, serde_json::to_vec_pretty(&report).unwrap_or_default()).await;
            let _ = tokio::fs::write(&trace_path, serde_json::to_vec_pretty(&trace).unwrap_or_default()).await;

            // §7: "The wrapping layer raises to the caller only when it
            // itself cannot persist a report." A write failure here is
            // that case; everything else resolves to a critical_failure
            // envelope on stdout instead of a process-level error.
            if let Err(e) = report_written {
                tracing::error!(error = %e, "could not persist error report");
                eprintln!("critical failure and could not persist error report: {e}");
                return ExitCode::FAILURE;
            }

            tracing::error!(run_id = %outcome.run_id, critical_failures = outcome.critical_failures.len(), "run failed critically");
            let body = serde_json::json!({
                "status": "critical_failure",
                "error": format!("{} critical failure(s) during run", outcome.critical_failures.len()),
                "error_report_path": report_path,
            });
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            ExitCode::SUCCESS
        }
    }
}
