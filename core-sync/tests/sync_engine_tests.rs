//! End-to-end tests of the sync engine against real temp directories
//!
//! The probe/encode tools are replaced by in-process fakes:
//! - a source file whose contents start with `AUDIO:<codec>` probes as
//!   audio in that codec; anything else has no audio stream
//! - the encoder writes `ENCODED:<encoder>` to its output, optionally
//!   slowly, and fails for inputs containing `FAIL` after writing a
//!   partial file

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{AudioEncoder, AudioProber, EncodeRequest, ProbeReport, StreamInfo};
use core_async::time::{sleep, Duration};
use core_runtime::config::{OutputFormat, OutputProfile, SyncJob};
use core_runtime::events::{CoreEvent, EventBus, LogEvent, MessageKey, SyncEvent};
use core_sync::{SyncConfig, SyncCoordinator, SyncError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Fakes
// ============================================================================

struct ContentProber;

#[async_trait]
impl AudioProber for ContentProber {
    async fn probe(&self, path: &Path) -> BridgeResult<ProbeReport> {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        let streams = match contents.strip_prefix("AUDIO:") {
            Some(rest) => {
                let codec = rest.split_whitespace().next().unwrap_or_default();
                vec![StreamInfo::new("audio", codec)]
            }
            None => vec![StreamInfo::new("video", "mjpeg")],
        };
        Ok(ProbeReport::new(streams))
    }
}

#[derive(Default)]
struct FakeEncoder {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeEncoder {
    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    async fn encode(&self, request: &EncodeRequest) -> BridgeResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        let input = std::fs::read_to_string(&request.input)?;
        if input.contains("FAIL") {
            std::fs::write(&request.output, b"half an mp3")?;
            return Err(BridgeError::ProcessFailed {
                tool: "ffmpeg".to_string(),
                exit_code: 1,
                stderr: "Error while decoding stream".to_string(),
            });
        }

        std::fs::write(&request.output, format!("ENCODED:{}", request.encoder))?;
        Ok(())
    }
}

// ============================================================================
// Fixture
// ============================================================================

struct Library {
    _dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl Library {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("library");
        let dest = dir.path().join("player");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        Self {
            _dir: dir,
            source,
            dest,
        }
    }

    fn add(&self, relative: &str, contents: &str) {
        let path = self.source.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn job(&self, format_id: u32) -> SyncJob {
        let format = OutputFormat::by_id(format_id).unwrap();
        SyncJob::new(
            "player",
            &self.source,
            &self.dest,
            OutputProfile::new(format.name, format, 0),
        )
        .with_escape_filenames(false)
    }

    /// Every file under the destination, relative path to contents
    fn dest_files(&self) -> BTreeMap<String, Vec<u8>> {
        walk(&self.dest)
            .into_iter()
            .map(|path| {
                let relative = path
                    .strip_prefix(&self.dest)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                (relative, std::fs::read(&path).unwrap())
            })
            .collect()
    }
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(walk(&path));
        } else {
            files.push(path);
        }
    }
    files
}

fn coordinator(
    workers: usize,
    encoder: Arc<FakeEncoder>,
    bus: Arc<EventBus>,
) -> Arc<SyncCoordinator> {
    Arc::new(SyncCoordinator::new(
        SyncConfig::default().with_worker_count(workers),
        Arc::new(ContentProber),
        encoder,
        bus,
    ))
}

fn drain_logs(events: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<LogEvent> {
    let mut logs = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Sync(SyncEvent::Log { event, .. }) = event {
            logs.push(event);
        }
    }
    logs
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mirrors_tree_with_transcodes_and_copies() {
    let library = Library::new();
    library.add("Artist/Album/01 Intro.flac", "AUDIO:flac");
    library.add("Artist/Album/02 Outro.FLAC", "AUDIO:flac");
    library.add("Artist/Album/cover.jpg", "jpeg bytes");
    library.add("Artist/Album/03 Already.mp3", "AUDIO:mp3");
    library.add("Artist/Album/video.m4a", "no audio here");
    library.add("playlist.m3u", "#EXTM3U");

    let encoder = Arc::new(FakeEncoder::default());
    let coordinator = coordinator(3, Arc::clone(&encoder), Arc::new(EventBus::default()));

    let summary = coordinator.run_sync(library.job(0)).await.unwrap();
    assert_eq!(summary.total, 6);
    assert_eq!(summary.completed, 6);
    assert_eq!(summary.failed, 0);
    assert!(!summary.cancelled);
    assert_eq!(encoder.calls(), 2);

    let files = library.dest_files();
    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "Artist/Album/01 Intro.mp3",
            "Artist/Album/02 Outro.mp3",
            "Artist/Album/03 Already.mp3",
            "Artist/Album/cover.jpg",
            "Artist/Album/video.m4a",
            "playlist.m3u",
        ]
    );
    assert_eq!(files["Artist/Album/01 Intro.mp3"], b"ENCODED:libmp3lame");
    assert_eq!(files["Artist/Album/03 Already.mp3"], b"AUDIO:mp3");
    assert_eq!(files["Artist/Album/cover.jpg"], b"jpeg bytes");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_run_is_idempotent() {
    let library = Library::new();
    library.add("a/1.flac", "AUDIO:flac");
    library.add("a/2.ogg", "AUDIO:vorbis");
    library.add("a/notes.txt", "liner notes");
    library.add("b/3.mp3", "AUDIO:mp3");

    let encoder = Arc::new(FakeEncoder::default());
    let bus = Arc::new(EventBus::default());
    let coordinator = coordinator(2, Arc::clone(&encoder), Arc::clone(&bus));

    coordinator.run_sync(library.job(0)).await.unwrap();
    let first = library.dest_files();
    let encodes = encoder.calls();

    let mut events = bus.subscribe();
    let summary = coordinator.run_sync(library.job(0)).await.unwrap();

    assert_eq!((summary.total, summary.completed, summary.failed), (4, 4, 0));
    assert_eq!(encoder.calls(), encodes);
    assert_eq!(library.dest_files(), first);

    let skipped = drain_logs(&mut events)
        .into_iter()
        .filter(|log| {
            matches!(log, LogEvent::Info { key: MessageKey::PathAlreadyExists, .. })
        })
        .count();
    assert_eq!(skipped, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_encode_is_isolated_and_leaves_no_partial_file() {
    let library = Library::new();
    library.add("good.flac", "AUDIO:flac");
    library.add("bad.flac", "AUDIO:flac FAIL");
    library.add("art.png", "png");

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let coordinator = coordinator(2, Arc::new(FakeEncoder::default()), Arc::clone(&bus));

    let summary = coordinator.run_sync(library.job(0)).await.unwrap();
    assert_eq!((summary.total, summary.completed, summary.failed), (3, 2, 1));

    let files = library.dest_files();
    assert!(files.contains_key("good.mp3"));
    assert!(files.contains_key("art.png"));
    assert!(!files.contains_key("bad.mp3"));
    assert!(!files.keys().any(|name| name.contains(".tmp")));

    let errors: Vec<Option<String>> = drain_logs(&mut events)
        .into_iter()
        .filter_map(|log| match log {
            LogEvent::Error { path, .. } => Some(path),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![Some("bad.flac".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_format_copied_unless_reencode_requested() {
    let library = Library::new();
    library.add("track.flac", "AUDIO:flac");

    let encoder = Arc::new(FakeEncoder::default());
    let coordinator = coordinator(1, Arc::clone(&encoder), Arc::new(EventBus::default()));

    coordinator.run_sync(library.job(1)).await.unwrap();
    assert_eq!(encoder.calls(), 0);
    assert_eq!(library.dest_files()["track.flac"], b"AUDIO:flac");

    std::fs::remove_file(library.dest.join("track.flac")).unwrap();

    let reencode = library.job(1).with_reencode_same_format(true);
    coordinator.run_sync(reencode).await.unwrap();
    assert_eq!(encoder.calls(), 1);
    assert_eq!(library.dest_files()["track.flac"], b"ENCODED:flac");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_escaped_filenames_layout() {
    let library = Library::new();
    library.add("AC:DC/Live?/01 Thunder*.flac", "AUDIO:flac");
    library.add("AC:DC/Live?/folder.jpg", "jpeg");

    let coordinator = coordinator(2, Arc::new(FakeEncoder::default()), Arc::new(EventBus::default()));
    let job = library.job(3).with_escape_filenames(true);

    let summary = coordinator.run_sync(job).await.unwrap();
    assert_eq!(summary.failed, 0);

    let files = library.dest_files();
    assert_eq!(files["AC_：DC/Live_？/01 Thunder_＊.opus"], b"ENCODED:libopus");
    assert_eq!(files["AC_：DC/Live_？/folder.jpg"], b"jpeg");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counters_never_exceed_total() {
    let library = Library::new();
    for i in 0..30 {
        library.add(&format!("disc/{:02}.flac", i), "AUDIO:flac");
    }

    let encoder = Arc::new(FakeEncoder::slow(Duration::from_millis(5)));
    let coordinator = coordinator(4, encoder, Arc::new(EventBus::default()));
    let tracker = coordinator.tracker();

    let handle = Arc::clone(&coordinator).start_sync(library.job(0));

    while !handle.is_finished() {
        let (total, completed, failed) = tracker.counters();
        assert!(completed + failed <= total, "{} + {} > {}", completed, failed, total);
        sleep(Duration::from_millis(1)).await;
    }

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.completed + summary.failed, summary.total);
    assert_eq!(summary.total, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_stops_at_task_boundary() {
    let library = Library::new();
    for i in 0..40 {
        library.add(&format!("{:02}.flac", i), "AUDIO:flac");
    }

    let workers = 2;
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let encoder = Arc::new(FakeEncoder::slow(Duration::from_millis(40)));
    let coordinator = coordinator(workers, Arc::clone(&encoder), Arc::clone(&bus));

    let handle = Arc::clone(&coordinator).start_sync(library.job(0));

    while coordinator.progress().await.completed < 2 {
        sleep(Duration::from_millis(5)).await;
    }

    let snapshot = coordinator.progress().await;
    let run_id = coordinator.cancel_sync().await.unwrap();
    assert_eq!(Some(run_id), snapshot.run_id);
    assert!(coordinator.is_sync_active());
    assert!(matches!(
        coordinator.cancel_sync().await,
        Err(SyncError::NotRunning)
    ));

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.cancelled);
    // Files in flight at the snapshot, plus at most one more per worker
    // picked up before the cancel bit landed
    assert!(summary.completed + summary.failed <= snapshot.processed() + 2 * workers as u64);
    assert!(summary.unprocessed() > 0);
    assert!(!coordinator.is_sync_active());
    assert!(coordinator.progress().await.is_idle());
    assert!(!library.dest_files().keys().any(|name| name.contains(".tmp")));

    let finished = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            CoreEvent::Sync(SyncEvent::Finished { cancelled, .. }) => Some(cancelled),
            _ => None,
        });
    assert_eq!(finished, Some(true));

    // The engine accepts a new run once the cancelled one drained
    let rerun = coordinator.run_sync(library.job(0)).await.unwrap();
    assert!(!rerun.cancelled);
    assert_eq!(rerun.completed, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_start_while_running_is_rejected() {
    let library = Library::new();
    for i in 0..6 {
        library.add(&format!("{}.flac", i), "AUDIO:flac");
    }

    let encoder = Arc::new(FakeEncoder::slow(Duration::from_millis(30)));
    let coordinator = coordinator(1, encoder, Arc::new(EventBus::default()));

    let handle = Arc::clone(&coordinator).start_sync(library.job(0));
    while !coordinator.is_sync_active() {
        sleep(Duration::from_millis(1)).await;
    }

    let err = coordinator.run_sync(library.job(0)).await.unwrap_err();
    assert!(matches!(err, SyncError::SyncInProgress { .. }));

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.completed, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_source_aborts_run() {
    let library = Library::new();
    let mut job = library.job(0);
    job.source_dir = library.source.join("unplugged");

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let coordinator = coordinator(2, Arc::new(FakeEncoder::default()), Arc::clone(&bus));

    let err = coordinator.run_sync(job).await.unwrap_err();
    assert!(matches!(err, SyncError::Enumeration { .. }));
    assert!(!coordinator.is_sync_active());
    assert!(library.dest_files().is_empty());

    let aborted = std::iter::from_fn(|| events.try_recv().ok())
        .any(|event| matches!(event, CoreEvent::Sync(SyncEvent::Aborted { .. })));
    assert!(aborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_aborted_run_releases_engine() {
    let library = Library::new();
    for i in 0..4 {
        library.add(&format!("{}.flac", i), "AUDIO:flac");
    }

    let coordinator = coordinator(
        2,
        Arc::new(FakeEncoder::slow(Duration::from_millis(200))),
        Arc::new(EventBus::default()),
    );

    let handle = Arc::clone(&coordinator).start_sync(library.job(0));
    while coordinator.progress().await.total == 0 {
        sleep(Duration::from_millis(5)).await;
    }

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert!(!coordinator.is_sync_active());
    assert!(coordinator.progress().await.is_idle());
    assert!(matches!(
        coordinator.cancel_sync().await,
        Err(SyncError::NotRunning)
    ));

    let rerun = coordinator.run_sync(library.job(0)).await.unwrap();
    assert_eq!(rerun.total, 4);
    assert_eq!(rerun.completed, 4);
    assert!(!rerun.cancelled);
}
