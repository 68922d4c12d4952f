use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vidshelf::media::catalog::VideoId;
use vidshelf::media::extract::{FfmpegExtractor, FrameExtractor};
use vidshelf::media::reconcile::Reconciler;
use vidshelf::media::thumbs::ThumbnailStore;

/// Extractor that returns a frame derived from the file name, except for
/// names it has been told to fail. Records every call.
#[derive(Default)]
struct FakeExtractor {
    failing: Mutex<Vec<String>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl FakeExtractor {
    fn failing(names: &[&str]) -> Self {
        FakeExtractor {
            failing: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        FakeExtractor {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn set_failing(&self, names: &[&str]) {
        *self.failing.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    fn calls_for(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

fn frame_for(name: &str) -> Vec<u8> {
    format!("jpeg:{name}").into_bytes()
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract(&self, video: &Path) -> Option<Vec<u8>> {
        let name = video.file_name()?.to_str()?.to_string();
        *self.calls.lock().unwrap().entry(name.clone()).or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&name) {
            return None;
        }
        Some(frame_for(&name))
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    source: PathBuf,
    cache: PathBuf,
    extractor: Arc<FakeExtractor>,
    reconciler: Arc<Reconciler>,
}

impl Fixture {
    fn new(videos: &[&str], extractor: FakeExtractor) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("videos");
        let cache = tmp.path().join("thumbnails");
        fs::create_dir(&source).unwrap();
        for name in videos {
            fs::write(source.join(name), b"video").unwrap();
        }
        let store = ThumbnailStore::open(&cache).unwrap();
        let extractor = Arc::new(extractor);
        let reconciler = Arc::new(Reconciler::new(&source, store, extractor.clone()));
        Fixture {
            _tmp: tmp,
            source,
            cache,
            extractor,
            reconciler,
        }
    }

    fn store(&self) -> &ThumbnailStore {
        self.reconciler.store()
    }

    fn seed_artifact(&self, video: &str, bytes: &[u8]) {
        fs::write(self.cache.join(format!("{video}.jpg")), bytes).unwrap();
    }

    fn cache_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.cache)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    fn artifact(&self, video: &str) -> Option<Vec<u8>> {
        fs::read(self.cache.join(format!("{video}.jpg"))).ok()
    }
}

fn ids(names: &[&str]) -> Vec<VideoId> {
    names.iter().map(|n| VideoId::new(*n).unwrap()).collect()
}

fn catalog_names(pass: &vidshelf::media::reconcile::Reconciliation) -> Vec<String> {
    pass.catalog.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn first_pass_generates_a_thumbnail_per_video() {
    let fx = Fixture::new(&["a.mp4", "b.mkv", "c.webm"], FakeExtractor::default());

    let pass = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(catalog_names(&pass), vec!["a.mp4", "b.mkv", "c.webm"]);
    assert_eq!(pass.generated, ids(&["a.mp4", "b.mkv", "c.webm"]));
    assert!(pass.removed.is_empty());
    assert!(pass.failed.is_empty());
    assert_eq!(fx.cache_entries(), vec!["a.mp4.jpg", "b.mkv.jpg", "c.webm.jpg"]);
    assert_eq!(fx.artifact("b.mkv"), Some(frame_for("b.mkv")));
}

#[tokio::test]
async fn every_video_has_artifact_or_recorded_failure_and_no_orphans_survive() {
    let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"], FakeExtractor::failing(&["b.mp4"]));
    fx.seed_artifact("old.mp4", b"stale");
    fx.seed_artifact("gone.webm", b"stale");

    let pass = fx.reconciler.reconcile().await.unwrap();

    for id in pass.catalog.iter() {
        assert!(
            fx.store().exists(id) || pass.failed.contains(id),
            "{id} has neither a thumbnail nor a recorded failure"
        );
    }
    for artifact in fx.store().list().unwrap() {
        let video = artifact.strip_suffix(".jpg").unwrap();
        assert!(pass.catalog.contains(video), "orphan {artifact} survived");
    }
}

#[tokio::test]
async fn second_pass_without_changes_is_a_no_op() {
    let fx = Fixture::new(&["a.mp4", "b.mp4"], FakeExtractor::default());

    let first = fx.reconciler.reconcile().await.unwrap();
    let before = fx.cache_entries();
    let second = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(first.catalog, second.catalog);
    assert!(!second.changed());
    assert!(second.generated.is_empty());
    assert!(second.removed.is_empty());
    assert_eq!(fx.cache_entries(), before);
    assert_eq!(fx.extractor.total_calls(), 2);
}

#[tokio::test]
async fn existing_thumbnail_is_never_regenerated() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::default());
    fx.seed_artifact("a.mp4", b"original");

    fx.reconciler.reconcile().await.unwrap();
    fx.extractor.set_failing(&["a.mp4"]);
    fx.reconciler.reconcile().await.unwrap();

    assert_eq!(fx.extractor.calls_for("a.mp4"), 0);
    assert_eq!(fx.artifact("a.mp4"), Some(b"original".to_vec()));
}

#[tokio::test]
async fn replaced_video_content_keeps_old_thumbnail() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::default());
    fx.reconciler.reconcile().await.unwrap();

    fs::write(fx.source.join("a.mp4"), b"different content").unwrap();
    let pass = fx.reconciler.reconcile().await.unwrap();

    assert!(!pass.changed());
    assert_eq!(fx.extractor.calls_for("a.mp4"), 1);
}

#[tokio::test]
async fn orphaned_thumbnail_is_removed_and_others_untouched() {
    let fx = Fixture::new(&["A.mp4", "C.mp4"], FakeExtractor::default());
    fx.seed_artifact("A.mp4", b"thumb-a");
    fx.seed_artifact("B.mp4", b"thumb-b");
    fx.seed_artifact("C.mp4", b"thumb-c");

    let pass = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(pass.removed, vec!["B.mp4.jpg"]);
    assert!(pass.generated.is_empty());
    assert_eq!(fx.cache_entries(), vec!["A.mp4.jpg", "C.mp4.jpg"]);
    assert_eq!(fx.artifact("A.mp4"), Some(b"thumb-a".to_vec()));
    assert_eq!(fx.artifact("C.mp4"), Some(b"thumb-c".to_vec()));
    assert_eq!(fx.extractor.total_calls(), 0);
}

#[tokio::test]
async fn video_removed_between_passes_loses_its_thumbnail() {
    let fx = Fixture::new(&["a.mp4", "b.mp4"], FakeExtractor::default());
    fx.reconciler.reconcile().await.unwrap();

    fs::remove_file(fx.source.join("b.mp4")).unwrap();
    let pass = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(catalog_names(&pass), vec!["a.mp4"]);
    assert_eq!(pass.removed, vec!["b.mp4.jpg"]);
    assert_eq!(fx.cache_entries(), vec!["a.mp4.jpg"]);
}

#[tokio::test]
async fn non_artifact_files_in_cache_are_left_alone() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::default());
    fs::write(fx.cache.join("notes.txt"), b"?").unwrap();
    fs::write(fx.cache.join("old.mkv"), b"video").unwrap();

    let pass = fx.reconciler.reconcile().await.unwrap();

    assert!(pass.removed.is_empty());
    assert_eq!(fx.cache_entries(), vec!["a.mp4.jpg", "notes.txt", "old.mkv"]);
}

#[tokio::test]
async fn cache_sharing_the_source_directory_never_deletes_videos() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("movie.mp4"), b"video").unwrap();
    fs::write(tmp.path().join("readme.txt"), b"text").unwrap();
    fs::write(tmp.path().join("gone.mkv.jpg"), b"thumb").unwrap();
    let store = ThumbnailStore::open(tmp.path()).unwrap();
    let reconciler = Reconciler::new(tmp.path(), store, Arc::new(FakeExtractor::default()));

    let pass = reconciler.reconcile().await.unwrap();

    assert_eq!(pass.removed, vec!["gone.mkv.jpg"]);
    assert_eq!(fs::read(tmp.path().join("movie.mp4")).unwrap(), b"video");
    assert!(tmp.path().join("readme.txt").exists());
    assert!(tmp.path().join("movie.mp4.jpg").is_file());
}

#[tokio::test]
async fn directory_in_place_of_artifact_counts_as_missing() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::default());
    fs::create_dir(fx.cache.join("a.mp4.jpg")).unwrap();

    let pass = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(pass.failed, ids(&["a.mp4"]));
    assert!(!pass.has_thumbnail(&VideoId::new("a.mp4").unwrap()));
    assert!(!fx.store().exists(&VideoId::new("a.mp4").unwrap()));
}

#[tokio::test]
async fn failed_extraction_leaves_gap_but_keeps_video_listed() {
    let fx = Fixture::new(&["A.mp4", "B.mp4"], FakeExtractor::failing(&["B.mp4"]));

    let pass = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(catalog_names(&pass), vec!["A.mp4", "B.mp4"]);
    assert_eq!(pass.generated, ids(&["A.mp4"]));
    assert_eq!(pass.failed, ids(&["B.mp4"]));
    assert!(pass.has_thumbnail(&VideoId::new("A.mp4").unwrap()));
    assert!(!pass.has_thumbnail(&VideoId::new("B.mp4").unwrap()));
    assert_eq!(fx.cache_entries(), vec!["A.mp4.jpg"]);
}

#[tokio::test]
async fn failed_extraction_is_retried_on_next_pass() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::failing(&["a.mp4"]));

    let first = fx.reconciler.reconcile().await.unwrap();
    assert_eq!(first.failed, ids(&["a.mp4"]));

    fx.extractor.set_failing(&[]);
    let second = fx.reconciler.reconcile().await.unwrap();

    assert_eq!(second.generated, ids(&["a.mp4"]));
    assert!(second.failed.is_empty());
    assert_eq!(fx.extractor.calls_for("a.mp4"), 2);
}

#[tokio::test]
async fn concurrent_passes_do_not_duplicate_work_or_corrupt_cache() {
    let fx = Fixture::new(
        &["a.mp4", "b.mp4", "c.mp4", "d.mp4"],
        FakeExtractor::slow(Duration::from_millis(20)),
    );

    let (first, second) = tokio::join!(fx.reconciler.reconcile(), fx.reconciler.reconcile());
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.catalog, second.catalog);
    assert_eq!(first.generated.len() + second.generated.len(), 4);
    for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
        assert_eq!(fx.extractor.calls_for(name), 1, "{name} extracted more than once");
        assert_eq!(fx.artifact(name), Some(frame_for(name)));
    }
    assert_eq!(
        fx.cache_entries(),
        vec!["a.mp4.jpg", "b.mp4.jpg", "c.mp4.jpg", "d.mp4.jpg"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_from_spawned_tasks_leave_consistent_cache() {
    let fx = Fixture::new(&["a.mp4", "b.mkv", "c.webm"], FakeExtractor::default());
    fx.seed_artifact("orphan.mp4", b"stale");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reconciler = fx.reconciler.clone();
            tokio::spawn(async move { reconciler.reconcile().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fx.cache_entries(), vec!["a.mp4.jpg", "b.mkv.jpg", "c.webm.jpg"]);
    assert_eq!(fx.extractor.total_calls(), 3);
}

#[tokio::test]
async fn unreadable_source_fails_without_touching_store() {
    let fx = Fixture::new(&["a.mp4"], FakeExtractor::default());
    fx.seed_artifact("a.mp4", b"thumb-a");
    fx.seed_artifact("b.mp4", b"thumb-b");
    fs::remove_dir_all(&fx.source).unwrap();

    let result = fx.reconciler.reconcile().await;

    assert!(result.is_err());
    assert_eq!(fx.cache_entries(), vec!["a.mp4.jpg", "b.mp4.jpg"]);
    assert_eq!(fx.extractor.total_calls(), 0);
}

#[tokio::test]
async fn single_job_still_backfills_everything() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        fs::write(tmp.path().join(name), b"video").unwrap();
    }
    let store = ThumbnailStore::open(tmp.path().join("thumbnails")).unwrap();
    let reconciler = Reconciler::new(tmp.path(), store, Arc::new(FakeExtractor::default())).with_jobs(0);

    let pass = reconciler.reconcile().await.unwrap();
    assert_eq!(pass.generated.len(), 3);
}

#[tokio::test]
async fn missing_ffmpeg_binary_yields_no_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let video = tmp.path().join("a.mp4");
    fs::write(&video, b"video").unwrap();
    let extractor = FfmpegExtractor::new(tmp.path().join("no-such-ffmpeg"), Duration::from_secs(5));

    assert!(!extractor.probe().await);
    assert_eq!(extractor.extract(&video).await, None);
}
