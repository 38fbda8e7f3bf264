//! Errata CLI - replays a diagnostic update script through a provider.
//!
//! ```text
//! errata [script.jsonl | -]
//!
//! script ──▶ Replay ──▶ DiagnosticProvider ──▶ SerialExecutor ──▶ console sinks
//! ```
//!
//! Problems and squiggles are printed to stdout as the provider publishes
//! them; logs go to stderr. At end of input the provider is flushed, the
//! status line printed, and the provider disposed.

mod console;
mod replay;
mod script;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use errata_config::ErrataConfig;
use errata_provider::{Consumers, DiagnosticProvider, PublishContext, SerialExecutor};

use crate::console::{ConsoleDecorations, ConsoleProblemList};
use crate::replay::Replay;

fn init_tracing(config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match ErrataConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (ErrataConfig::default(), Some(err)),
    };
    init_tracing(config.log_filter().as_deref());
    if let Some(err) = config_error {
        tracing::warn!(path = %err.path().display(), "{err}; using defaults");
    }

    let script_path = env::args_os().nth(1).map(PathBuf::from);
    let ops = script::parse(&script::read(script_path.as_deref())?)?;
    tracing::debug!(ops = ops.len(), "Script loaded");

    let executor = Arc::new(SerialExecutor::spawn().context("failed to start publish thread")?);
    let stdout = Arc::new(Mutex::new(io::stdout()));
    let provider = DiagnosticProvider::new(
        &config.provider_config(),
        tokio::runtime::Handle::current(),
        Consumers {
            context: Arc::clone(&executor) as Arc<dyn PublishContext>,
            problem_list: Arc::new(ConsoleProblemList::new(Arc::clone(&stdout))),
            decorations: Arc::new(ConsoleDecorations::new(Arc::clone(&stdout))),
        },
    );

    let outcome = Replay::new(&provider).run(ops).await;
    if outcome.is_ok() {
        provider.flush().await?;
        let status = provider.snapshot().status_string();
        let mut out = stdout.lock();
        if status.is_empty() {
            writeln!(out, "no diagnostics")?;
        } else {
            writeln!(out, "{status}")?;
        }
        out.flush()?;
    }

    provider.dispose().await;
    drop(provider);
    if let Ok(executor) = Arc::try_unwrap(executor) {
        executor.shutdown();
    }

    outcome
}
