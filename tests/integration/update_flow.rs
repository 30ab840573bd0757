//! Full bootstrap passes against the scripted server: forced and
//! missing-artifact downloads, the equal-digest short circuit, the
//! bounded wait, and the detached download that lands for the next run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::TempDir;

use gantry_cli::bootstrap::Bootstrap;
use gantry_cli::config::ProxyConfig;
use gantry_cli::constants;
use gantry_cli::launch::{ArtifactLauncher, LaunchContext};
use gantry_cli::sink::MemorySink;

use crate::http_stub::{StubResponse, StubServer, md5_hex};

const ARTIFACT_PATH: &str = "/launcher";
const DIGEST_PATH: &str = "/launcher.md5";

struct LaunchRecord {
    artifact: PathBuf,
    bytes: Vec<u8>,
}

/// Captures launches, including the artifact bytes at the moment of
/// launch, so tests can prove the install happened first.
#[derive(Clone, Default)]
struct RecordingLauncher {
    launches: Arc<Mutex<Vec<LaunchRecord>>>,
}

impl RecordingLauncher {
    fn count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    fn last_bytes(&self) -> Vec<u8> {
        self.launches
            .lock()
            .unwrap()
            .last()
            .map(|record| record.bytes.clone())
            .unwrap_or_default()
    }

    fn last_artifact(&self) -> PathBuf {
        self.launches
            .lock()
            .unwrap()
            .last()
            .map(|record| record.artifact.clone())
            .unwrap_or_default()
    }
}

impl ArtifactLauncher for RecordingLauncher {
    fn launch(&self, artifact: &Path, _context: &LaunchContext) -> Result<()> {
        let bytes = std::fs::read(artifact).unwrap_or_default();
        self.launches.lock().unwrap().push(LaunchRecord {
            artifact: artifact.to_path_buf(),
            bytes,
        });
        Ok(())
    }
}

fn bootstrap_against(
    server: &StubServer,
    dir: &TempDir,
    sink: Arc<MemorySink>,
    launcher: &RecordingLauncher,
) -> Bootstrap {
    Bootstrap::new(dir.path().to_path_buf(), ProxyConfig::direct(), vec![], sink)
        .with_endpoints(server.url(ARTIFACT_PATH), server.url(DIGEST_PATH))
        .with_launcher(Box::new(launcher.clone()))
}

// The bootstrap resolves its working directory to canonical form, so
// expectations about launched paths must be built the same way.
fn canonical_path(dir: &TempDir) -> PathBuf {
    dir.path()
        .canonicalize()
        .unwrap()
        .join(constants::launcher_file_name())
}

fn pending_path(dir: &TempDir) -> PathBuf {
    dir.path()
        .canonicalize()
        .unwrap()
        .join(constants::pending_file_name())
}

#[tokio::test]
async fn test_missing_artifact_downloads_then_launches() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let build = b"build-42";
    server.script(
        ARTIFACT_PATH,
        vec![StubResponse::ok(build).with_etag(md5_hex(build))],
    );

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    // No artifact means a blocking download; the manifest is never
    // consulted.
    assert_eq!(server.hits(ARTIFACT_PATH), 1);
    assert_eq!(server.hits(DIGEST_PATH), 0);
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), build);
    assert!(!pending_path(&dir).exists());
    assert!(sink.contains("Renamed successfully."));
    assert!(sink.contains("Starting launcher."));
    assert_eq!(launcher.count(), 1);
    assert_eq!(launcher.last_artifact(), canonical_path(&dir));
    assert_eq!(launcher.last_bytes(), build);
}

#[tokio::test]
async fn test_current_artifact_skips_the_download_entirely() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let build = b"build-42";
    std::fs::write(canonical_path(&dir), build).unwrap();
    server.script(
        DIGEST_PATH,
        vec![StubResponse::ok(md5_hex(build).as_bytes())],
    );

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    assert_eq!(server.hits(ARTIFACT_PATH), 0);
    assert_eq!(server.hits(DIGEST_PATH), 1);
    // The search line belongs to a started download; with digests equal
    // none starts and only the not-in-time line appears.
    assert!(!sink.contains("Looking for update"));
    assert!(sink.contains("Didn't find an update in time."));
    assert_eq!(launcher.count(), 1);
    assert_eq!(launcher.last_bytes(), build);

    // The probe must defeat every cache along the way.
    let probe = server
        .requests()
        .into_iter()
        .find(|request| request.path == DIGEST_PATH)
        .unwrap();
    assert_eq!(probe.header("cache-control"), Some("no-store,max-age=0,no-cache"));
    assert_eq!(probe.header("pragma"), Some("no-cache"));
    assert_eq!(probe.header("expires"), Some("0"));
}

#[tokio::test]
async fn test_stale_artifact_installs_update_before_launch() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    let new = b"build-42";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(DIGEST_PATH, vec![StubResponse::ok(md5_hex(new).as_bytes())]);
    server.script(ARTIFACT_PATH, vec![StubResponse::ok(new).with_etag(md5_hex(new))]);

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    assert!(sink.contains("Looking for update"));
    assert!(sink.contains("Found update in time, waiting to download"));
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), new);
    assert!(!pending_path(&dir).exists());
    assert_eq!(launcher.count(), 1);
    assert_eq!(launcher.last_bytes(), new);

    // The download is conditional on the digest of the old build.
    let request = server
        .requests()
        .into_iter()
        .find(|request| request.path == ARTIFACT_PATH)
        .unwrap();
    assert_eq!(request.header("if-none-match"), Some(md5_hex(old).as_str()));
}

#[tokio::test]
async fn test_rejected_download_never_replaces_the_current_build() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    let new = b"build-42";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(DIGEST_PATH, vec![StubResponse::ok(md5_hex(new).as_bytes())]);
    // The first response confirms an update but its body does not match
    // the integrity tag; every retry after it hits a 404, so the
    // download fails for good after confirming.
    server.script(
        ARTIFACT_PATH,
        vec![
            StubResponse::ok(b"corrupt build").with_etag(md5_hex(new)),
            StubResponse::status(404),
        ],
    );

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    assert!(sink.contains("Found update in time, waiting to download"));
    assert!(sink.contains("After downloading, the digest didn't match. Retrying."));
    assert!(sink.contains(
        "Unable to download remote file. Check your internet connection/proxy settings."
    ));
    assert_eq!(server.hits(ARTIFACT_PATH), 10);

    // The rejected bytes never reach the canonical path; the build that
    // was already installed is the one that launches.
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), old);
    assert_eq!(launcher.count(), 1);
    assert_eq!(launcher.last_bytes(), old);
}

#[tokio::test]
async fn test_slow_download_blocks_past_the_window_then_installs() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    let new = b"build-42";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(DIGEST_PATH, vec![StubResponse::ok(md5_hex(new).as_bytes())]);
    // Headers arrive immediately (inside the three-second window); the
    // body takes four seconds, past the window.
    server.script(
        ARTIFACT_PATH,
        vec![StubResponse::ok(new)
            .with_etag(md5_hex(new))
            .with_body_delay(Duration::from_secs(4))],
    );

    let started = Instant::now();
    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    // Confirmed updates are waited for however long they take.
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(sink.contains("Found update in time, waiting to download"));
    assert!(!sink.contains("Didn't find an update in time."));
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), new);
    assert_eq!(launcher.last_bytes(), new);
}

#[tokio::test]
async fn test_timed_out_download_continues_detached_and_installs_next_run() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    let new = b"build-42";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(DIGEST_PATH, vec![StubResponse::ok(md5_hex(new).as_bytes())]);
    // The status line itself takes five seconds, so the three-second
    // wait for the update-found signal times out.
    server.script(
        ARTIFACT_PATH,
        vec![StubResponse::ok(new)
            .with_etag(md5_hex(new))
            .with_head_delay(Duration::from_secs(5))],
    );

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    // The stale build launched; nothing was installed yet.
    assert!(sink.contains("Didn't find an update in time."));
    assert_eq!(launcher.count(), 1);
    assert_eq!(launcher.last_bytes(), old);
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), old);

    // The download was not cancelled; it finishes on its own and leaves
    // a pending artifact behind.
    let pending = pending_path(&dir);
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if std::fs::read(&pending).map(|bytes| bytes == new).unwrap_or(false) {
            break;
        }
        assert!(Instant::now() < deadline, "detached download never landed");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), old);

    // The next run promotes the cached update before any networking
    // and then finds itself current.
    let second_sink = Arc::new(MemorySink::new());
    bootstrap_against(&server, &dir, second_sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap();

    assert!(second_sink.contains("Found cached update"));
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), new);
    assert_eq!(launcher.count(), 2);
    assert_eq!(launcher.last_bytes(), new);
    // Still only the one artifact download across both runs.
    assert_eq!(server.hits(ARTIFACT_PATH), 1);
}

#[tokio::test]
async fn test_forced_update_replaces_a_current_build() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    let new = b"build-42";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(ARTIFACT_PATH, vec![StubResponse::ok(new).with_etag(md5_hex(new))]);

    bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(true)
        .await
        .unwrap();

    // Forced mode skips the probe and downloads unconditionally.
    assert_eq!(server.hits(DIGEST_PATH), 0);
    let request = server
        .requests()
        .into_iter()
        .find(|request| request.path == ARTIFACT_PATH)
        .unwrap();
    assert_eq!(request.header("if-none-match"), None);

    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), new);
    assert_eq!(launcher.last_bytes(), new);
}

#[tokio::test]
async fn test_forced_download_without_an_update_is_fatal() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    let old = b"build-41";
    std::fs::write(canonical_path(&dir), old).unwrap();
    server.script(ARTIFACT_PATH, vec![StubResponse::status(500)]);

    let err = bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(true)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Unable to download while being forced"));
    assert!(sink.contains("No update found."));
    assert_eq!(server.hits(ARTIFACT_PATH), 1);
    assert_eq!(launcher.count(), 0);
    assert_eq!(std::fs::read(canonical_path(&dir)).unwrap(), old);
}

#[tokio::test]
async fn test_missing_artifact_with_persistent_not_found_is_fatal() {
    let server = StubServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let launcher = RecordingLauncher::default();

    server.script(ARTIFACT_PATH, vec![StubResponse::status(404)]);

    let err = bootstrap_against(&server, &dir, sink.clone(), &launcher)
        .run(false)
        .await
        .unwrap_err();

    // 404s are retried to the attempt cap before the blocking download
    // gives up, and with no artifact to fall back to that is fatal.
    assert_eq!(server.hits(ARTIFACT_PATH), 10);
    assert!(err.to_string().contains("Unable to download while being forced"));
    assert!(sink.contains("Remote file not found."));
    assert!(sink.contains(
        "Unable to download remote file. Check your internet connection/proxy settings."
    ));
    assert_eq!(launcher.count(), 0);
}
