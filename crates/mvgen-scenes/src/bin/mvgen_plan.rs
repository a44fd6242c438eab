//! Build a generation plan from analysis output.
//!
//! Usage: `mvgen-plan [request.json]`. Reads a `{analysis, parameters}`
//! document from the given file or stdin and prints the plan JSON on stdout.

use std::io::{Read, Write};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mvgen_scenes::{plan_generation, PlanRequest};

fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read plan request {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read plan request from stdin")?;
            buf
        }
    };

    let request: PlanRequest =
        serde_json::from_str(&raw).context("plan request is not valid JSON")?;

    info!(
        title = %request.parameters.title,
        spans = request.analysis.transcript.len(),
        "Planning generation"
    );

    let plan = plan_generation(&request.analysis, &request.parameters)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &plan)?;
    writeln!(out)?;

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mvgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}
