//! Assertion helpers shared by integration tests

use file_dl::Event;
use std::path::Path;
use tokio::sync::broadcast;

/// Events already queued on the receiver
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// `(bytes_done, bytes_total)` of every progress event, in arrival order
pub fn progress_of(events: &[Event]) -> Vec<(u64, u64)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress {
                bytes_done,
                bytes_total,
                ..
            } => Some((*bytes_done, *bytes_total)),
            _ => None,
        })
        .collect()
}

/// Fail if any `.part` staging file remains in `dir`
pub fn assert_no_staging_files(dir: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(dir)
        .expect("read destination dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");
}
