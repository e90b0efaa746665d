mod bootstrap;
mod console;

use std::str::FromStr;

use anyhow::{Context, Result};
use mission_core::mission::MissionSpec;
use mission_core::models::Decision;
use mission_core::settings::Settings;
use mission_core::time_utils::resolve_timezone;
use mission_runtime::connection::{ConnectionManager, SessionHandle};
use mission_runtime::transport::WebSocketConnector;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::console::TranscriptPrinter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Mission Control v{} starting", env!("CARGO_PKG_VERSION"));

    let mission_path = settings.mission_path()?;
    let spec = MissionSpec::load_from(mission_path)
        .with_context(|| format!("could not load mission from {}", mission_path.display()))?;

    let tz = resolve_timezone(&settings.timezone);
    let mut printer = TranscriptPrinter::new(tz, settings.twelve_hour());
    let mut manager = ConnectionManager::new(WebSocketConnector, settings.url.clone());
    tracing::info!(
        "Orchestrator: {}, Timezone: {}, Time format: {}",
        manager.url(),
        settings.timezone,
        settings.time_format
    );

    println!("Launching mission: {}", spec.label());
    if let Some(passes) = spec.training_iterations() {
        println!("Training passes requested: {passes}");
    }
    let handle = match manager.launch(spec).await {
        Ok(handle) => handle,
        Err(e) => {
            if let Some(session) = manager.join().await {
                printer.print(&session.snapshot());
            }
            return Err(e).with_context(|| format!("could not start mission on {}", manager.url()));
        }
    };

    let interrupts = interrupts().context("could not listen for Ctrl+C")?;
    supervise(
        handle,
        &mut printer,
        BufReader::new(tokio::io::stdin()),
        interrupts,
    )
    .await;

    if let Some(session) = manager.join().await {
        let snapshot = session.snapshot();
        printer.print(&snapshot);
        for line in console::summary(&snapshot) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Ctrl+C presses, delivered as a channel.
///
/// One listener stays registered for the whole run, so a press that lands
/// while the supervisor is busy is queued rather than lost.
fn interrupts() -> std::io::Result<mpsc::Receiver<()>> {
    #[cfg(unix)]
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    #[cfg(windows)]
    let mut signal = tokio::signal::windows::ctrl_c()?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while signal.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Mirror the session on the console until it ends, forwarding operator
/// decisions read from `input` and turning interrupts into a cancel.
async fn supervise<R>(
    mut handle: SessionHandle,
    printer: &mut TranscriptPrinter,
    input: R,
    mut interrupts: mpsc::Receiver<()>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut input_open = true;
    let mut interrupts_open = true;

    printer.print(&handle.snapshot());

    loop {
        tokio::select! {
            update = handle.changed() => match update {
                Some(snapshot) => printer.print(&snapshot),
                None => break,
            },

            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => submit(&handle, line.trim()).await,
                Ok(None) => input_open = false,
                Err(e) => {
                    tracing::warn!("stdin unavailable: {e}");
                    input_open = false;
                }
            },

            interrupt = interrupts.recv(), if interrupts_open => match interrupt {
                Some(()) => {
                    tracing::info!("Ctrl+C received; cancelling mission");
                    handle.cancel().await;
                }
                None => interrupts_open = false,
            },
        }
    }
}

async fn submit(handle: &SessionHandle, line: &str) {
    if line.is_empty() {
        return;
    }
    let Some(request) = handle.snapshot().pending_intervention else {
        eprintln!("No intervention is pending.");
        return;
    };
    let decision = Decision::from_str(line).unwrap_or_else(|never| match never {});
    if !handle.resolve(request.request_id, decision).await {
        eprintln!("The mission has already ended.");
    }
}
