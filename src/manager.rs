//! Daemon lifecycle management.
//!
//! State lives in two places under the tool home: `pids/<index>.json` (PID,
//! start time, root path) and `logs/<index>.log`. A daemon is running iff its
//! PID file exists and the PID answers signal 0; stale PID files are removed
//! lazily by whichever operation trips over them. `start` re-executes the
//! current binary with the internal `daemon run` subcommand.

#![cfg(unix)]

use crate::config::HomeDirs;
use crate::store::Store;
use crate::types::{Result, SeekError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// How long `stop` waits for graceful shutdown before escalating.
const STOP_GRACE: Duration = Duration::from_secs(3);
/// How long `start` waits for the socket to appear.
const START_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidRecord {
    pub pid: u32,
    pub started_at: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub index: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    pub socket: PathBuf,
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

fn pid_alive(pid: u32) -> bool {
    // signal 0 probes for existence without delivering anything
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn read_pid_record(home: &HomeDirs, index: &str) -> Option<PidRecord> {
    let raw = std::fs::read_to_string(home.pid_path(index)).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Live record for the index, removing a stale PID file on the way.
fn live_record(home: &HomeDirs, index: &str) -> Option<PidRecord> {
    let record = read_pid_record(home, index)?;
    if pid_alive(record.pid) {
        Some(record)
    } else {
        debug!(index = index, pid = record.pid, "removing stale pid file");
        let _ = std::fs::remove_file(home.pid_path(index));
        let _ = std::fs::remove_file(home.socket_path(index));
        None
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub fn status(home: &HomeDirs, index: &str) -> DaemonStatus {
    let record = live_record(home, index);
    DaemonStatus {
        index: index.to_string(),
        running: record.is_some(),
        pid: record.as_ref().map(|r| r.pid),
        started_at: record.map(|r| r.started_at),
        socket: home.socket_path(index),
    }
}

pub fn list(home: &HomeDirs) -> Result<Vec<DaemonStatus>> {
    let mut out = Vec::new();
    if !home.pids.exists() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(&home.pids)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = name.strip_suffix(".json") {
            out.push(status(home, index));
        }
    }
    out.sort_by(|a, b| a.index.cmp(&b.index));
    Ok(out)
}

/// Spawn a daemon for `index`, detached, with output redirected to the
/// index's log file. Rejected if one is already running.
pub fn start(home: &HomeDirs, index: &str) -> Result<DaemonStatus> {
    if live_record(home, index).is_some() {
        return Err(SeekError::conflict(format!(
            "daemon for index '{index}' is already running; stop it first"
        )));
    }
    // the index must exist before we fork a process that will just die
    let meta = Store::open(home, index)?.meta().clone();

    let exe = std::env::current_exe()?;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(home.log_path(index))?;
    let log_err = log.try_clone()?;

    let child = std::process::Command::new(&exe)
        .arg("daemon")
        .arg("run")
        .arg("--index")
        .arg(index)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::from(log))
        .stderr(std::process::Stdio::from(log_err))
        .spawn()?;

    let record = PidRecord {
        pid: child.id(),
        started_at: chrono::Utc::now().to_rfc3339(),
        root: meta.root,
    };
    std::fs::write(home.pid_path(index), serde_json::to_string_pretty(&record)?)?;

    // wait for the socket so `start && query` works immediately
    let socket = home.socket_path(index);
    let deadline = std::time::Instant::now() + START_WAIT;
    while !socket.exists() && std::time::Instant::now() < deadline {
        if !pid_alive(record.pid) {
            let _ = std::fs::remove_file(home.pid_path(index));
            return Err(SeekError::conflict(format!(
                "daemon for index '{index}' exited during startup; see {}",
                home.log_path(index).display()
            )));
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if !socket.exists() {
        warn!(index = index, "daemon started but socket has not appeared yet");
    }

    Ok(status(home, index))
}

/// Graceful stop (SIGTERM), escalating to SIGKILL after a short grace, then
/// PID and socket file cleanup.
pub fn stop(home: &HomeDirs, index: &str) -> Result<()> {
    let Some(record) = live_record(home, index) else {
        return Err(SeekError::conflict(format!(
            "daemon for index '{index}' is not running"
        )));
    };

    unsafe {
        libc::kill(record.pid as libc::pid_t, libc::SIGTERM);
    }
    let deadline = std::time::Instant::now() + STOP_GRACE;
    while pid_alive(record.pid) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
    if pid_alive(record.pid) {
        warn!(index = index, pid = record.pid, "graceful stop timed out, killing");
        unsafe {
            libc::kill(record.pid as libc::pid_t, libc::SIGKILL);
        }
    }

    let _ = std::fs::remove_file(home.pid_path(index));
    let _ = std::fs::remove_file(home.socket_path(index));
    Ok(())
}

/// Last `tail` lines of the index's log (whole log when `tail` is None).
pub fn logs(home: &HomeDirs, index: &str, tail: Option<usize>) -> Result<String> {
    let path = home.log_path(index);
    if !path.exists() {
        return Ok(String::new());
    }
    let raw = std::fs::read_to_string(&path)?;
    match tail {
        None => Ok(raw),
        Some(n) => {
            let lines: Vec<&str> = raw.lines().collect();
            let start = lines.len().saturating_sub(n);
            Ok(lines[start..].join("\n"))
        }
    }
}

/// One-shot JSON-RPC round trip against a running daemon.
pub fn query(home: &HomeDirs, index: &str, method: &str, params: Value) -> Result<Value> {
    let socket = home.socket_path(index);
    if !socket.exists() {
        return Err(SeekError::conflict(format!(
            "daemon for index '{index}' is not running; start it first"
        )));
    }

    let mut stream = UnixStream::connect(&socket)?;
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let mut line = request.to_string();
    line.push('\n');
    stream.write_all(line.as_bytes())?;

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response)?;
    let value: Value = serde_json::from_str(response.trim())
        .map_err(|e| SeekError::provider(format!("malformed daemon response: {e}")))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_home(dir: &Path) -> HomeDirs {
        let home = HomeDirs {
            db: dir.join("db"),
            cache: dir.join("cache"),
            pids: dir.join("pids"),
            logs: dir.join("logs"),
            sockets: dir.join("sockets"),
        };
        for d in [&home.db, &home.cache, &home.pids, &home.logs, &home.sockets] {
            std::fs::create_dir_all(d).unwrap();
        }
        home
    }

    #[test]
    fn test_status_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = test_home(dir.path());
        let s = status(&home, "nope");
        assert!(!s.running);
        assert!(s.pid.is_none());
    }

    #[test]
    fn test_live_pid_is_reported_running() {
        let dir = tempfile::tempdir().unwrap();
        let home = test_home(dir.path());
        // our own PID is certainly alive
        let record = PidRecord {
            pid: std::process::id(),
            started_at: chrono::Utc::now().to_rfc3339(),
            root: PathBuf::from("/tmp"),
        };
        std::fs::write(home.pid_path("self"), serde_json::to_string(&record).unwrap()).unwrap();

        let s = status(&home, "self");
        assert!(s.running);
        assert_eq!(s.pid, Some(std::process::id()));
        assert_eq!(list(&home).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_pid_file_is_cleaned_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let home = test_home(dir.path());
        // an impossible pid: way above any real pid range
        let record = PidRecord {
            pid: u32::MAX - 1,
            started_at: chrono::Utc::now().to_rfc3339(),
            root: PathBuf::from("/tmp"),
        };
        std::fs::write(home.pid_path("stale"), serde_json::to_string(&record).unwrap()).unwrap();
        std::fs::write(home.socket_path("stale"), b"").unwrap();

        let s = status(&home, "stale");
        assert!(!s.running);
        assert!(!home.pid_path("stale").exists(), "stale pid file removed");
        assert!(!home.socket_path("stale").exists(), "stale socket removed");

        // stop on a non-running daemon is a conflict
        assert!(matches!(stop(&home, "stale").unwrap_err(), SeekError::Conflict(_)));
    }

    #[test]
    fn test_logs_tail() {
        let dir = tempfile::tempdir().unwrap();
        let home = test_home(dir.path());
        std::fs::write(home.log_path("t"), "one\ntwo\nthree\nfour\n").unwrap();
        assert_eq!(logs(&home, "t", Some(2)).unwrap(), "three\nfour");
        assert!(logs(&home, "t", None).unwrap().starts_with("one"));
        assert_eq!(logs(&home, "missing", Some(3)).unwrap(), "");
    }

    #[test]
    fn test_query_without_socket_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let home = test_home(dir.path());
        let err = query(&home, "ghost", "ping", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, SeekError::Conflict(_)));
    }
}
