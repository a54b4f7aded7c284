//! Per-item workflow state machine.
//!
//! Drives the queue strictly in order: ask the presenter for per-item
//! configuration, launch the processor, stream its output, then decide
//! skip/advance/stop. Only a successful exit marks an item processed —
//! failed, skipped and cancelled items reappear on the next scan, which
//! is the intended retry policy, not an oversight. At most one item is
//! ever running; a user cancel kills the in-flight run and ends the
//! whole workflow.

use crate::runner::{self, ProcessorCommand};
use crate::scan::PendingItem;
use crate::state::ProcessedSetStore;
use crate::ui::{ItemConfig, ItemDecision, Presenter};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Workflow phase. The cursor only moves forward, and `Running` holds
/// for at most one item at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    AwaitingConfig,
    Running,
    Cancelling,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingConfig => "awaiting_config",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Done => "done",
        }
    }
}

/// Shared, readable workflow state. The controller writes every
/// transition; anything holding a clone can observe the current phase
/// and the full transition history.
#[derive(Clone, Default)]
pub struct WorkflowStatusHandle {
    inner: Arc<Mutex<Vec<RunState>>>,
}

impl WorkflowStatusHandle {
    pub fn get(&self) -> RunState {
        self.inner
            .lock()
            .unwrap()
            .last()
            .copied()
            .unwrap_or_default()
    }

    /// Every transition so far, in order (initial `Idle` not recorded).
    pub fn history(&self) -> Vec<RunState> {
        self.inner.lock().unwrap().clone()
    }

    fn set(&self, state: RunState) {
        debug!("workflow state -> {}", state.as_str());
        self.inner.lock().unwrap().push(state);
    }
}

/// Counts for the end-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed + self.skipped
    }
}

enum ItemOutcome {
    Advance,
    Stop,
}

pub struct WorkflowController {
    command: ProcessorCommand,
    store: ProcessedSetStore,
    presenter: Box<dyn Presenter>,
    /// External cancellation (ctrl-c in the CLI).
    shutdown: CancellationToken,
    status: WorkflowStatusHandle,
    cursor: usize,
}

impl WorkflowController {
    pub fn new(
        command: ProcessorCommand,
        store: ProcessedSetStore,
        presenter: Box<dyn Presenter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            command,
            store,
            presenter,
            shutdown,
            status: WorkflowStatusHandle::default(),
            cursor: 0,
        }
    }

    /// Clone of the shared status handle; stays readable after `run`
    /// consumes the controller.
    pub fn status(&self) -> WorkflowStatusHandle {
        self.status.clone()
    }

    /// Process the queue to completion. Consumes the controller; the
    /// processed set has been persisted item by item along the way.
    pub async fn run(mut self, queue: Vec<PendingItem>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if queue.is_empty() {
            self.status.set(RunState::Done);
            self.presenter.report_done(&summary);
            return Ok(summary);
        }

        while self.cursor < queue.len() {
            if self.shutdown.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let item = &queue[self.cursor];
            self.status.set(RunState::AwaitingConfig);

            match self.presenter.request_item_config(item)? {
                ItemDecision::Skip => {
                    // Deliberately not marked processed — a skipped item
                    // resurfaces on the next scan.
                    info!("Skipped {:?}", item.source_path);
                    summary.skipped += 1;
                    self.cursor += 1;
                }
                ItemDecision::Cancel => {
                    summary.cancelled = true;
                    break;
                }
                ItemDecision::Process(config) => {
                    match self.process_item(item, &config, &mut summary).await {
                        ItemOutcome::Advance => self.cursor += 1,
                        ItemOutcome::Stop => {
                            summary.cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        self.status.set(RunState::Done);
        self.presenter.report_done(&summary);
        Ok(summary)
    }

    /// Run the processor for one item and fold its terminal result into
    /// the summary. No error here aborts the rest of the queue.
    async fn process_item(
        &mut self,
        item: &PendingItem,
        config: &ItemConfig,
        summary: &mut RunSummary,
    ) -> ItemOutcome {
        let context = config.context_string();
        self.presenter
            .show_status(&format!("Processing: {}", item.display_name));

        let mut handle =
            match runner::start_item(&self.command, &item.source_path, Some(&context)) {
                Ok(handle) => handle,
                Err(e) => {
                    // Fatal for this item only; not marked processed.
                    warn!("Launch failed for {:?}: {}", item.source_path, e);
                    self.presenter
                        .show_status(&format!("Cannot launch processor: {}", e));
                    summary.failed += 1;
                    return ItemOutcome::Advance;
                }
            };

        self.status.set(RunState::Running);
        let run_cancel = handle.cancel_token();
        let mut cancel_requested = false;

        loop {
            tokio::select! {
                chunk = handle.recv_output() => match chunk {
                    Some(chunk) => self.presenter.append_output(&chunk),
                    None => break,
                },
                _ = self.shutdown.cancelled(), if !cancel_requested => {
                    cancel_requested = true;
                    self.status.set(RunState::Cancelling);
                    self.presenter.show_status("Cancelling...");
                    run_cancel.cancel();
                }
            }
        }

        let result = handle.wait().await;

        if result.cancelled || cancel_requested {
            // In-flight item stays unprocessed; no further items run.
            info!("Run cancelled during {:?}", item.source_path);
            return ItemOutcome::Stop;
        }

        if result.success() {
            if let Err(e) = self.store.mark_processed(&item.source_path) {
                // Losing dedup state risks reprocessing — say so loudly,
                // but keep the workflow going.
                warn!("Failed to persist processed set: {:#}", e);
                self.presenter
                    .show_status(&format!("Warning: could not record completion: {:#}", e));
            }
            self.presenter
                .show_status(&format!("Done: {}", item.display_name));
            summary.processed += 1;
        } else {
            info!(
                "Processor failed for {:?} (exit {:?}); will retry on a future scan",
                item.source_path, result.exit_code
            );
            self.presenter.show_status(&format!(
                "Failed (exit {}): {} — left unprocessed for retry",
                result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                item.display_name
            ));
            summary.failed += 1;
        }

        ItemOutcome::Advance
    }
}
