//! Top-level run orchestration.
//!
//! Wires the pieces together: resolve sources, load the processed set,
//! scan, then hand the queue to the workflow controller with ctrl-c
//! routed into its cancellation token.

use crate::cli::RunCliArgs;
use crate::config::Sources;
use crate::global;
use crate::runner;
use crate::scan;
use crate::state::ProcessedSetStore;
use crate::ui::{ItemConfig, TerminalPresenter};
use crate::workflow::WorkflowController;
use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub async fn run(args: RunCliArgs) -> Result<()> {
    let sources = Sources::load()?;
    let shutdown = spawn_ctrl_c_watcher();

    let preset = preset_from_args(&args);

    if args.scan_imports {
        return run_scan_imports(&sources, preset.as_ref(), shutdown).await;
    }

    let store = ProcessedSetStore::load(global::state_file()?);

    if let Some(file) = &args.file {
        return run_single(&sources, store, file, preset, shutdown).await;
    }

    print_banner(&sources, &store);

    let queue = scan::scan_all(&sources, &store);
    info!("Scan found {} pending item(s)", queue.len());

    let presenter = match preset {
        Some(config) => TerminalPresenter::with_preset(config),
        None => TerminalPresenter::new(),
    };
    let controller = WorkflowController::new(
        sources.process_command.clone(),
        store,
        Box::new(presenter),
        shutdown,
    );
    controller.run(queue).await?;
    Ok(())
}

/// Process exactly one file or recording folder, bypassing the scan.
async fn run_single(
    sources: &Sources,
    store: ProcessedSetStore,
    file: &std::path::Path,
    preset: Option<ItemConfig>,
    shutdown: CancellationToken,
) -> Result<()> {
    let item = scan::single_item(file)?;
    println!("Processing single item: {}", item.source_path.display());

    // Without explicit flags, single-file mode still prompts — the
    // preset only kicks in when the user gave --context/--category.
    let presenter = match preset {
        Some(config) => TerminalPresenter::with_preset(config),
        None => TerminalPresenter::new(),
    };
    let controller = WorkflowController::new(
        sources.process_command.clone(),
        store,
        Box::new(presenter),
        shutdown,
    );
    let summary = controller.run(vec![item]).await?;

    if summary.failed > 0 {
        bail!("Processing failed");
    }
    Ok(())
}

/// Forward to the processor's own batch import mode. The processor owns
/// its bookkeeping there, so the processed set is not touched.
async fn run_scan_imports(
    sources: &Sources,
    preset: Option<&ItemConfig>,
    shutdown: CancellationToken,
) -> Result<()> {
    let command = &sources.process_command;
    let context = preset.map(|c| c.context_string());
    let args = command.scan_imports_args(context.as_deref());

    println!("Delegating import scan to {}", command.program());
    let mut handle = runner::start(command.program(), &args, None)?;

    let run_cancel = handle.cancel_token();
    let mut cancel_requested = false;
    loop {
        tokio::select! {
            chunk = handle.recv_output() => match chunk {
                Some(chunk) => {
                    use std::io::Write;
                    print!("{}", chunk);
                    let _ = std::io::stdout().flush();
                }
                None => break,
            },
            _ = shutdown.cancelled(), if !cancel_requested => {
                cancel_requested = true;
                println!("Cancelling...");
                run_cancel.cancel();
            }
        }
    }

    let result = handle.wait().await;
    if result.cancelled {
        println!("Import scan cancelled.");
        return Ok(());
    }
    if !result.success() {
        bail!("Import scan failed (exit {:?})", result.exit_code);
    }
    Ok(())
}

fn preset_from_args(args: &RunCliArgs) -> Option<ItemConfig> {
    if args.context.is_none() && args.category.is_none() {
        return None;
    }
    Some(ItemConfig {
        category: args.category.unwrap_or_default(),
        free_text: args.context.clone().unwrap_or_default(),
    })
}

fn print_banner(sources: &Sources, store: &ProcessedSetStore) {
    println!("{}", "=".repeat(60));
    println!("meetsync {}", env!("CARGO_PKG_VERSION"));
    println!("Recordings:  {}", sources.transcript_dir.display());
    println!("Imports:     {}", sources.import_dir.display());
    if let Some(alt) = &sources.alt_transcript_dir {
        println!("Transcripts: {}", alt.display());
    }
    println!("Processor:   {}", sources.process_command.program());
    println!("Previously processed: {} item(s)", store.len());
    println!("{}", "=".repeat(60));
}

fn spawn_ctrl_c_watcher() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, requesting cancellation");
            watcher.cancel();
        }
    });
    token
}
