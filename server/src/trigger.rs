//! Change trigger: file watching, stabilization and pipeline runs
//!
//! The exporter rewrites the artifact in several bursts. A run only starts
//! once no write has been seen for the stabilization window, and writes that
//! land while a run is in progress coalesce into a single follow-up run.

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::artifact;
use crate::config::FigmaConfig;
use crate::remote;
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    PendingStabilization { deadline: Instant },
    Processing { rerun: bool },
}

#[derive(Debug)]
pub struct TriggerMachine {
    window: Duration,
    state: TriggerState,
}

impl TriggerMachine {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: TriggerState::Idle,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TriggerState::PendingStabilization { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Every write restarts the quiet period.
    pub fn on_write(&mut self, at: Instant) {
        self.state = match self.state {
            TriggerState::Processing { .. } => TriggerState::Processing { rerun: true },
            _ => TriggerState::PendingStabilization {
                deadline: at + self.window,
            },
        };
    }

    /// Returns true when the caller should start a run.
    pub fn settle(&mut self, now: Instant) -> bool {
        match self.state {
            TriggerState::PendingStabilization { deadline } if now >= deadline => {
                self.state = TriggerState::Processing { rerun: false };
                true
            }
            _ => false,
        }
    }

    pub fn finish(&mut self, now: Instant) {
        self.state = match self.state {
            TriggerState::Processing { rerun: true } => TriggerState::PendingStabilization {
                deadline: now + self.window,
            },
            _ => TriggerState::Idle,
        };
    }
}

/// Read, convert, cache and broadcast the current artifact. A failed run
/// leaves the previously published document in place.
pub async fn process(state: &AppState, figma: Option<&FigmaConfig>) -> Result<usize> {
    let (summary, assembly) = artifact::load(&state.file).await?;
    info!("Processing {}", summary);

    for skipped in &assembly.skipped {
        warn!("Skipped primitive {}: {}", skipped.index, skipped.reason);
    }
    let document = assembly.into_document(chrono::Utc::now());
    let total = document.metadata.total_shapes;
    state
        .publish(&document)
        .await
        .context("Failed to serialize scene document")?;

    if let Some(figma) = figma {
        tokio::spawn(remote::log_document(figma.clone()));
    }
    Ok(total)
}

async fn run_once(state: &AppState, figma: Option<&FigmaConfig>) {
    match process(state, figma).await {
        Ok(total) => info!("Published {} scene nodes", total),
        Err(e) => error!("Failed to process {:?}: {:#}", state.file, e),
    }
}

/// Drive the trigger until every write sender is gone. Each event carries
/// the instant the write was observed.
pub async fn run(
    writes: mpsc::Receiver<Instant>,
    window: Duration,
    state: Arc<AppState>,
    figma: Option<FigmaConfig>,
) {
    let state = &*state;
    let figma = figma.as_ref();
    drive(writes, window, move || run_once(state, figma)).await;
}

/// The trigger loop proper. `step` runs inline, so at most one run is in
/// flight; writes queued during a run collapse into one follow-up run.
pub async fn drive<F, Fut>(mut writes: mpsc::Receiver<Instant>, window: Duration, mut step: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut machine = TriggerMachine::new(window);
    let mut open = true;

    loop {
        match machine.deadline() {
            None if !open => break,
            None => match writes.recv().await {
                Some(at) => machine.on_write(at),
                None => open = false,
            },
            Some(deadline) => {
                tokio::select! {
                    biased;
                    write = writes.recv(), if open => match write {
                        Some(at) => machine.on_write(at),
                        None => open = false,
                    },
                    _ = sleep_until(deadline) => {}
                }
            }
        }

        if machine.settle(Instant::now()) {
            step().await;
            while let Ok(at) = writes.try_recv() {
                machine.on_write(at);
            }
            machine.finish(Instant::now());
        }
    }
    debug!("Change trigger stopped");
}

/// Forward debounced writes to the watched file into `tx`.
pub async fn watch_file(path: PathBuf, poll: Duration, tx: mpsc::Sender<Instant>) -> Result<()> {
    let (notify_tx, mut notify_rx) = mpsc::channel::<PathBuf>(16);

    let mut debouncer = new_debouncer(poll, move |res: DebounceEventResult| match res {
        Ok(events) => {
            for event in events {
                let _ = notify_tx.blocking_send(event.path);
            }
        }
        Err(e) => error!("Watch error: {:?}", e),
    })
    .context("Failed to create file watcher")?;

    let watch_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", watch_dir))?;

    info!("Watching directory: {:?}", watch_dir);

    while let Some(changed) = notify_rx.recv().await {
        if changed == path || changed.file_name() == path.file_name() {
            debug!("Write detected: {:?}", changed);
            if tx.send(Instant::now()).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}
