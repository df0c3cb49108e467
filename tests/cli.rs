//! End-to-end tests for the timelock binary against a local time server

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::{tempdir, TempDir};
use timelock::config::Config;
use tiny_http::{Header, Response, Server};

/// 2026-01-01T00:00:00Z
const T0: i64 = 1_767_225_600;

/// Serves `{"unixtime": <now>}` until the process exits
fn time_server() -> (String, Arc<AtomicI64>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let now = Arc::new(AtomicI64::new(T0));
    let served = Arc::clone(&now);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let body = format!("{{\"unixtime\": {}}}", served.load(Ordering::SeqCst));
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let _ = request.respond(Response::from_string(body).with_header(header));
        }
    });

    (format!("http://{}/api/time", addr), now)
}

fn unused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}/", listener.local_addr().unwrap())
}

struct Env {
    dir: TempDir,
    config: PathBuf,
}

impl Env {
    fn new(time_url: &str) -> Self {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.state_dir = dir.path().join("state");
        config.time.url = time_url.to_string();
        config.time.retry_attempts = 1;
        config.time.timeout_secs = 5;

        let config_path = dir.path().join("config.json");
        config.save(&config_path).unwrap();

        Env {
            dir,
            config: config_path,
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("timelock").unwrap();
        cmd.env_remove("RUST_LOG")
            .env_remove("TIMELOCK_STATE_DIR")
            .env_remove("TIMELOCK_TIME_URL")
            .env_remove("TIMELOCK_SLOT_MODE")
            .env_remove("TIMELOCK_UTC_OFFSET_MINUTES")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn lock_missing_file_exits_1() {
    let env = Env::new(&unused_url());
    let missing = env.dir.path().join("missing.txt");

    env.cmd()
        .args(["lock", arg(&missing), "60"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn lock_zero_duration_exits_1() {
    let env = Env::new(&unused_url());
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .args(["lock", arg(&doc), "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid duration"));
    assert_eq!(fs::read(&doc).unwrap(), b"plain");
}

#[test]
fn negative_duration_is_an_argument_error() {
    let env = Env::new(&unused_url());
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .args(["lock", arg(&doc), "-5"])
        .assert()
        .failure();
}

#[test]
fn time_source_down_exits_2_and_writes_nothing() {
    let env = Env::new(&unused_url());
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .args(["lock", arg(&doc), "60"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("time source unavailable"));

    assert_eq!(fs::read(&doc).unwrap(), b"plain");
    assert!(!env.state_dir().join("file_key.key").exists());
    assert!(!env.state_dir().join("lock_metadata.json").exists());
}

#[test]
fn lock_then_unlock_after_expiry() {
    let (url, now) = time_server();
    let env = Env::new(&url);
    let doc = env.file("doc.txt", b"the plans");

    env.cmd()
        .args(["lock", arg(&doc), "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now locked until 2026-01-01 05:30:02 +05:30"));
    assert_ne!(fs::read(&doc).unwrap(), b"the plans");

    let metadata = fs::read_to_string(env.state_dir().join("lock_metadata.json")).unwrap();
    assert!(metadata.contains("2026-01-01T05:30:02+05:30"));

    now.store(T0 + 1, Ordering::SeqCst);
    env.cmd()
        .args(["unlock", arg(&doc)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("still locked"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("doc.txt"))
        .stdout(predicate::str::contains("1s remaining"));

    now.store(T0 + 3, Ordering::SeqCst);
    env.cmd()
        .args(["unlock", arg(&doc)])
        .assert()
        .success()
        .stdout(predicate::str::contains("has been unlocked"));

    assert_eq!(fs::read(&doc).unwrap(), b"the plans");
    assert!(!env.state_dir().join("file_key.key").exists());
    assert!(!env.state_dir().join("lock_metadata.json").exists());

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active locks."));
}

#[test]
fn tampered_file_exits_3_and_keeps_state() {
    let (url, now) = time_server();
    let env = Env::new(&url);
    let doc = env.file("doc.txt", b"balance sheet");

    env.cmd().args(["lock", arg(&doc), "1"]).assert().success();

    let mut sealed = fs::read(&doc).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0xFF;
    fs::write(&doc, &sealed).unwrap();

    now.store(T0 + 10, Ordering::SeqCst);
    env.cmd()
        .args(["unlock", arg(&doc)])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("tampered"));

    assert!(env.state_dir().join("file_key.key").exists());
    assert!(env.state_dir().join("lock_metadata.json").exists());
}

#[test]
fn single_slot_orphans_previous_file() {
    let (url, now) = time_server();
    let env = Env::new(&url);
    let a = env.file("a.txt", b"alpha");
    let b = env.file("b.txt", b"bravo");

    env.cmd().args(["lock", arg(&a), "1"]).assert().success();
    env.cmd()
        .args(["lock", arg(&b), "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("can no longer be unlocked"));

    now.store(T0 + 5, Ordering::SeqCst);
    env.cmd()
        .args(["unlock", arg(&a)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Path mismatch"));
}

#[test]
fn per_file_mode_tracks_both_files() {
    let (url, now) = time_server();
    let env = Env::new(&url);
    let a = env.file("a.txt", b"alpha");
    let b = env.file("b.txt", b"bravo");

    env.cmd()
        .args(["--per-file", "lock", arg(&a), "1"])
        .assert()
        .success();
    env.cmd()
        .args(["--per-file", "lock", arg(&b), "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("can no longer be unlocked").not());

    now.store(T0 + 5, Ordering::SeqCst);
    env.cmd()
        .args(["--per-file", "unlock", arg(&a)])
        .assert()
        .success();
    env.cmd()
        .args(["--per-file", "unlock", arg(&b)])
        .assert()
        .success();

    assert_eq!(fs::read(&a).unwrap(), b"alpha");
    assert_eq!(fs::read(&b).unwrap(), b"bravo");
}

#[test]
fn unlock_without_lock_exits_1() {
    let (url, _now) = time_server();
    let env = Env::new(&url);
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .args(["unlock", arg(&doc)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No active lock"));
}

#[test]
fn prompt_locks_file() {
    let (url, _now) = time_server();
    let env = Env::new(&url);
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .arg("prompt")
        .write_stdin(format!("LOCK\n{}\n30\n", arg(&doc)))
        .assert()
        .success()
        .stdout(predicate::str::contains("is now locked"));
    assert_ne!(fs::read(&doc).unwrap(), b"plain");
}

#[test]
fn prompt_rejects_unknown_command() {
    let env = Env::new(&unused_url());
    let doc = env.file("doc.txt", b"plain");

    env.cmd()
        .arg("prompt")
        .write_stdin(format!("shred\n{}\n", arg(&doc)))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please enter 'lock' or 'unlock'"));
}
