//! File-change events for live reindexing.
//!
//! The engine itself does not watch anything; it consumes debounced
//! [`ChangeEvent`] batches. This module defines that contract and ships a
//! notify-backed emitter the CLI wires to `update` runs. The daemon never
//! consumes these events: its in-memory graph reflects the index at load
//! time and a restart is required to observe new data.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Quiet period after the last event before a batch is delivered.
const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Keep this alive for as long as events should flow; dropping it stops the
/// watcher thread.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
}

/// Watch `root` recursively and deliver debounced change batches to `sink`.
/// Returns `None` when the platform watcher cannot be created.
pub fn watch_root<F>(root: &Path, mut sink: F) -> Option<WatchHandle>
where
    F: FnMut(Vec<ChangeEvent>) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Event>();

    let mut watcher = match RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "could not create file watcher");
            return None;
        }
    };

    if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
        warn!(root = %root.display(), error = %e, "could not watch root");
        return None;
    }

    std::thread::spawn(move || {
        debounce_loop(rx, |batch| sink(batch));
    });

    Some(WatchHandle { _watcher: watcher })
}

fn classify(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => {
            // rename-away shows up as Modify on some platforms
            if path.exists() {
                Some(ChangeKind::Modified)
            } else {
                Some(ChangeKind::Removed)
            }
        }
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

/// Collect raw events and deliver a batch once the stream has been quiet for
/// the debounce window. Later events for the same path supersede earlier
/// ones.
fn debounce_loop<F>(rx: mpsc::Receiver<Event>, mut deliver: F)
where
    F: FnMut(Vec<ChangeEvent>),
{
    let mut pending: HashMap<PathBuf, (ChangeKind, Instant)> = HashMap::new();

    loop {
        match rx.recv_timeout(DEBOUNCE) {
            Ok(event) => {
                let now = Instant::now();
                for path in event.paths {
                    if let Some(kind) = classify(&event.kind, &path) {
                        pending.insert(path, (kind, now));
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if pending.is_empty() {
                    continue;
                }
                let cutoff = Instant::now() - DEBOUNCE;
                let ready: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, t))| *t <= cutoff)
                    .map(|(p, _)| p.clone())
                    .collect();
                if ready.is_empty() {
                    continue;
                }
                let mut batch = Vec::with_capacity(ready.len());
                for path in ready {
                    if let Some((kind, _)) = pending.remove(&path) {
                        batch.push(ChangeEvent { path, kind });
                    }
                }
                batch.sort_by(|a, b| a.path.cmp(&b.path));
                deliver(batch);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_debounce_coalesces_per_path() {
        let (tx, rx) = mpsc::channel::<Event>();
        let batches: Arc<Mutex<Vec<Vec<ChangeEvent>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);

        let handle = std::thread::spawn(move || {
            debounce_loop(rx, move |batch| sink.lock().unwrap().push(batch));
        });

        let mut create = Event::new(EventKind::Create(CreateKind::File));
        create.paths.push(PathBuf::from("/tmp/a.ts"));
        tx.send(create).unwrap();

        let mut remove = Event::new(EventKind::Remove(RemoveKind::File));
        remove.paths.push(PathBuf::from("/tmp/a.ts"));
        tx.send(remove).unwrap();

        let mut other = Event::new(EventKind::Create(CreateKind::File));
        other.paths.push(PathBuf::from("/tmp/b.ts"));
        tx.send(other).unwrap();

        // wait past two debounce windows, then close the channel
        std::thread::sleep(Duration::from_millis(1200));
        drop(tx);
        handle.join().unwrap();

        let collected = batches.lock().unwrap();
        assert_eq!(collected.len(), 1, "one coalesced batch expected");
        let batch = &collected[0];
        assert_eq!(batch.len(), 2);
        // the later Remove supersedes the Create for a.ts
        let a = batch.iter().find(|e| e.path.ends_with("a.ts")).unwrap();
        assert_eq!(a.kind, ChangeKind::Removed);
        let b = batch.iter().find(|e| e.path.ends_with("b.ts")).unwrap();
        assert_eq!(b.kind, ChangeKind::Created);
    }
}
