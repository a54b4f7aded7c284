//! End-to-end scan → workflow pipeline over a temp directory tree, with
//! a shell script standing in for the external processor.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use meetsync::config::Sources;
use meetsync::runner::ProcessorCommand;
use meetsync::scan::{self, PendingItem};
use meetsync::state::ProcessedSetStore;
use meetsync::ui::{ItemConfig, ItemDecision, Presenter};
use meetsync::workflow::{RunState, RunSummary, WorkflowController};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct PresenterLog {
    output: String,
    requests: Vec<String>,
}

struct ScriptedPresenter {
    decisions: VecDeque<ItemDecision>,
    log: Arc<Mutex<PresenterLog>>,
}

impl Presenter for ScriptedPresenter {
    fn show_status(&self, _text: &str) {}

    fn append_output(&self, chunk: &str) {
        self.log.lock().unwrap().output.push_str(chunk);
    }

    fn request_item_config(&mut self, item: &PendingItem) -> anyhow::Result<ItemDecision> {
        self.log
            .lock()
            .unwrap()
            .requests
            .push(item.display_name.clone());
        Ok(self
            .decisions
            .pop_front()
            .unwrap_or(ItemDecision::Process(ItemConfig::default())))
    }

    fn report_done(&self, _summary: &RunSummary) {}
}

fn make_recording(root: &Path, name: &str, status: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("transcripts.json"), r#"{"segments":[]}"#).unwrap();
    std::fs::write(
        dir.join("metadata.json"),
        format!(r#"{{"status":"{status}"}}"#),
    )
    .unwrap();
}

/// Processor stand-in: instant success for everything except the import
/// file, which announces itself and then hangs until killed.
fn write_processor(root: &Path) -> PathBuf {
    let script = root.join("processor.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\ncase \"$1\" in\n  *c.mp3) printf import-started; sleep 30;;\nesac\nexit 0\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    script
}

fn fixture_sources(root: &Path) -> Sources {
    let transcript_dir = root.join("recordings");
    let import_dir = root.join("imported");
    std::fs::create_dir_all(&transcript_dir).unwrap();
    std::fs::create_dir_all(&import_dir).unwrap();

    make_recording(&transcript_dir, "A", "completed");
    make_recording(&transcript_dir, "B", "completed");
    // Not completed yet — must never surface in the queue.
    make_recording(&transcript_dir, "C", "processing");
    std::fs::write(import_dir.join("c.mp3"), b"x").unwrap();
    std::fs::write(import_dir.join("notes.txt"), b"x").unwrap();

    Sources {
        transcript_dir,
        alt_transcript_dir: None,
        import_dir,
        process_command: ProcessorCommand::parse(write_processor(root).to_str().unwrap()),
    }
}

#[tokio::test]
async fn full_pipeline_success_skip_then_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let sources = fixture_sources(root);
    let state_path = root.join("state.json");

    // First scan: A and B first (structured source), then the import.
    let store = ProcessedSetStore::load(state_path.clone());
    let queue = scan::scan_all(&sources, &store);
    let names: Vec<_> = queue.iter().map(|i| i.display_name.clone()).collect();
    assert_eq!(names, vec!["A", "B", "c.mp3"]);

    // Process A, skip B, start c.mp3 and cancel it mid-run.
    let log = Arc::new(Mutex::new(PresenterLog::default()));
    let presenter = ScriptedPresenter {
        decisions: VecDeque::from(vec![
            ItemDecision::Process(ItemConfig::default()),
            ItemDecision::Skip,
            ItemDecision::Process(ItemConfig::default()),
        ]),
        log: log.clone(),
    };
    let shutdown = CancellationToken::new();
    let controller = WorkflowController::new(
        sources.process_command.clone(),
        store,
        Box::new(presenter),
        shutdown.clone(),
    );
    let status = controller.status();
    let run = tokio::spawn(controller.run(queue));

    // Wait until the import run has actually started before cancelling.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if log.lock().unwrap().output.contains("import-started") {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "import run never started"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    shutdown.cancel();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.cancelled);
    assert_eq!(log.lock().unwrap().requests, vec!["A", "B", "c.mp3"]);

    // A runs, B only reaches configuration (skip), c.mp3 runs until the
    // cancel lands; the workflow then ends.
    assert_eq!(
        status.history(),
        vec![
            RunState::AwaitingConfig,
            RunState::Running,
            RunState::AwaitingConfig,
            RunState::AwaitingConfig,
            RunState::Running,
            RunState::Cancelling,
            RunState::Done,
        ]
    );

    // Only A is recorded; skip and cancel left nothing behind.
    let store = ProcessedSetStore::load(state_path.clone());
    assert_eq!(store.len(), 1);
    assert!(store.contains(&sources.transcript_dir.join("A")));

    // The next scan resurfaces the skipped and cancelled items only.
    let names: Vec<_> = scan::scan_all(&sources, &store)
        .into_iter()
        .map(|i| i.display_name)
        .collect();
    assert_eq!(names, vec!["B", "c.mp3"]);
}

#[tokio::test]
async fn single_item_helper_infers_kind() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let media = root.join("talk.MP4");
    std::fs::write(&media, b"x").unwrap();
    let transcript = root.join("notes.md");
    std::fs::write(&transcript, b"x").unwrap();
    let folder = root.join("standup");
    std::fs::create_dir_all(&folder).unwrap();

    assert_eq!(
        scan::single_item(&media).unwrap().kind,
        meetsync::scan::SourceKind::MediaImport
    );
    assert_eq!(
        scan::single_item(&transcript).unwrap().kind,
        meetsync::scan::SourceKind::Transcript
    );
    assert_eq!(
        scan::single_item(&folder).unwrap().kind,
        meetsync::scan::SourceKind::Recording
    );
    assert!(scan::single_item(&root.join("missing.mp3")).is_err());
}
