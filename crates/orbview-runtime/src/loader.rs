use orbview_gltf::{LoadEvent, LoadEventKind, LoadId, spawn_load};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use winit::event_loop::EventLoopProxy;

/// Starts asynchronous model loads. Results come back later as
/// [`LoadEvent`]s that the caller feeds to [`crate::Viewer::handle_load_event`].
pub trait ModelLoader {
    fn load(&self, id: LoadId, path: &Path);
}

/// Loads on a worker thread and posts every event to the winit event loop,
/// so the viewer only ever sees them on the loop thread.
pub struct ThreadedLoader<T: 'static> {
    proxy: EventLoopProxy<T>,
}

impl<T: 'static> ThreadedLoader<T> {
    pub fn new(proxy: EventLoopProxy<T>) -> Self {
        Self { proxy }
    }
}

impl<T> ModelLoader for ThreadedLoader<T>
where
    T: From<LoadEvent> + Send + 'static,
{
    fn load(&self, id: LoadId, path: &Path) {
        let proxy = self.proxy.clone();
        let post = move |event: LoadEvent| {
            if proxy.send_event(T::from(event)).is_err() {
                log::debug!("event loop closed, dropping load event for {id:?}");
            }
        };
        start_load(id, path, post, spawn_load);
    }
}

/// Runs `spawn`; if no worker could be started the load still ends with a
/// `Failed` event through `post`.
fn start_load<P, S>(id: LoadId, path: &Path, post: P, spawn: S)
where
    P: Fn(LoadEvent) + Clone + Send + 'static,
    S: FnOnce(LoadId, PathBuf, P) -> io::Result<JoinHandle<()>>,
{
    if let Err(e) = spawn(id, path.to_path_buf(), post.clone()) {
        log::error!("failed to start loader thread for {}: {e}", path.display());
        post(LoadEvent {
            id,
            kind: LoadEventKind::Failed(format!("failed to start loader thread: {e}")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn channel_post() -> (impl Fn(LoadEvent) + Clone + Send + 'static, mpsc::Receiver<LoadEvent>) {
        let (tx, rx) = mpsc::channel();
        let post = move |event: LoadEvent| {
            let _ = tx.send(event);
        };
        (post, rx)
    }

    #[test]
    fn spawn_failure_is_reported_as_failed() {
        let (post, rx) = channel_post();
        start_load(LoadId(4), Path::new("computer.glb"), post, |_, _, _| {
            Err(io::Error::other("no threads left"))
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, LoadId(4));
        match &events[0].kind {
            LoadEventKind::Failed(msg) => assert!(msg.contains("no threads left"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn worker_events_reach_the_sink() {
        let (post, rx) = channel_post();
        let missing = std::env::temp_dir().join("orbview-loader-missing.glb");
        start_load(LoadId(9), &missing, post, spawn_load);

        let events: Vec<_> = rx.iter().collect();
        assert!(events.iter().all(|e| e.id == LoadId(9)));
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(LoadEventKind::Failed(_))
        ));
    }
}
