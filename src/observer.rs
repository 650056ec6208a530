//! Per-operation callbacks from the tree differ and the commit engine.
//!
//! The core never prints; callers decide how (or whether) to render progress.

use crate::patch_format::ChangeKind;

pub trait PatchObserver {
    fn file(&mut self, _kind: ChangeKind, _path: &str) {}

    fn asset(&mut self, _kind: ChangeKind, _archive: &str, _id: u32, _name: &str) {}

    /// A modified or deleted asset op named an id the archive does not hold.
    fn asset_missing(&mut self, _kind: ChangeKind, _archive: &str, _id: u32, _name: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PatchObserver for NullObserver {}

/// Emits one `log` record per operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PatchObserver for LogObserver {
    fn file(&mut self, kind: ChangeKind, path: &str) {
        log::info!("{} {}", kind, path);
    }

    fn asset(&mut self, kind: ChangeKind, _archive: &str, id: u32, name: &str) {
        log::info!("    {} {} [{:08X}]", kind, name, id);
    }

    fn asset_missing(&mut self, kind: ChangeKind, archive: &str, id: u32, name: &str) {
        log::warn!(
            "{}: cannot {} asset {} [{:08X}], it is not in the archive",
            archive,
            kind.to_string().to_lowercase(),
            name,
            id
        );
    }
}

/// One observed operation, as collected by [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    File(ChangeKind, String),
    Asset(ChangeKind, String, u32),
    AssetMissing(ChangeKind, String, u32),
}

/// Collects every callback in order.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl PatchObserver for Recorder {
    fn file(&mut self, kind: ChangeKind, path: &str) {
        self.events.push(Event::File(kind, path.to_string()));
    }

    fn asset(&mut self, kind: ChangeKind, archive: &str, id: u32, _name: &str) {
        self.events.push(Event::Asset(kind, archive.to_string(), id));
    }

    fn asset_missing(&mut self, kind: ChangeKind, archive: &str, id: u32, _name: &str) {
        self.events
            .push(Event::AssetMissing(kind, archive.to_string(), id));
    }
}
