//! Asset loading for glTF 2.0 / GLB files.
//!
//! Loads run on a worker thread and report back through a caller supplied
//! sink, one [`LoadEvent`] at a time: zero or more `Progress` events, then
//! exactly one `Loaded` or `Failed`.

pub mod import;

pub use import::parse_first_node;

use anyhow::{Context, Result};
use orbview_scene::Node;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadId(pub u64);

#[derive(Debug)]
pub enum LoadEventKind {
    Progress { loaded: u64, total: Option<u64> },
    Loaded(Node),
    Failed(String),
}

#[derive(Debug)]
pub struct LoadEvent {
    pub id: LoadId,
    pub kind: LoadEventKind,
}

/// Starts loading `path` on a worker thread.
///
/// A panic inside the importer is reported as `Failed`, so the sink always
/// sees a final event.
pub fn spawn_load<F>(id: LoadId, path: PathBuf, mut sink: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut(LoadEvent) + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("orbview-load-{}", id.0))
        .spawn(move || {
            let total = fs::metadata(&path).ok().map(|m| m.len());
            sink(LoadEvent {
                id,
                kind: LoadEventKind::Progress { loaded: 0, total },
            });

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                read_and_parse(id, &path, total, &mut sink)
            }));
            let kind = match outcome {
                Ok(Ok(node)) => LoadEventKind::Loaded(node),
                Ok(Err(e)) => LoadEventKind::Failed(format!("{e:#}")),
                Err(payload) => LoadEventKind::Failed(format!(
                    "failed to load {}: importer panicked: {}",
                    path.display(),
                    panic_message(payload.as_ref())
                )),
            };
            sink(LoadEvent { id, kind });
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

fn read_and_parse<F>(id: LoadId, path: &Path, total: Option<u64>, sink: &mut F) -> Result<Node>
where
    F: FnMut(LoadEvent),
{
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    sink(LoadEvent {
        id,
        kind: LoadEventKind::Progress {
            loaded: bytes.len() as u64,
            total,
        },
    });
    parse_first_node(&bytes, path.parent())
        .with_context(|| format!("failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn is_terminal(event: &LoadEvent) -> bool {
        !matches!(event.kind, LoadEventKind::Progress { .. })
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("orbview-{}-{name}", std::process::id()))
    }

    fn collect(id: LoadId, path: PathBuf) -> Vec<LoadEvent> {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_load(id, path, move |ev| {
            let _ = tx.send(ev);
        })
        .unwrap();
        handle.join().unwrap();
        rx.into_iter().collect()
    }

    #[test]
    fn successful_load_reports_progress_then_node() {
        let path = temp_path("computer.glb");
        fs::write(&path, import::tests::computer_glb()).unwrap();

        let events = collect(LoadId(7), path.clone());
        let _ = fs::remove_file(&path);

        assert!(events.iter().all(|e| e.id == LoadId(7)));
        let (last, rest) = events.split_last().unwrap();
        assert!(!rest.is_empty());
        assert!(rest.iter().all(|e| !is_terminal(e)));
        match &last.kind {
            LoadEventKind::Loaded(node) => assert_eq!(node.name.as_deref(), Some("Computer")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_file_fails_with_path_in_message() {
        let path = temp_path("does-not-exist.glb");
        let events = collect(LoadId(1), path);

        let last = events.last().unwrap();
        match &last.kind {
            LoadEventKind::Failed(msg) => assert!(msg.contains("does-not-exist.glb"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events.iter().filter(|e| is_terminal(e)).count(), 1);
    }

    #[test]
    fn malformed_accessor_still_ends_in_failure() {
        let path = temp_path("empty-positions.glb");
        fs::write(&path, import::tests::empty_positions_glb()).unwrap();

        let events = collect(LoadId(3), path.clone());
        let _ = fs::remove_file(&path);

        assert_eq!(events.iter().filter(|e| is_terminal(e)).count(), 1);
        match &events.last().unwrap().kind {
            LoadEventKind::Failed(msg) => assert!(msg.contains("empty-positions.glb"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        let from_str = panic::catch_unwind(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(panic_message(from_str.as_ref()), "boom");

        let from_string = panic::catch_unwind(|| -> u8 { panic!("{} {}", "bad", 7) }).unwrap_err();
        assert_eq!(panic_message(from_string.as_ref()), "bad 7");
    }
}
