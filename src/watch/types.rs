use std::path::PathBuf;

use notify::EventKind;
use notify::event::ModifyKind;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Map a notify event kind. Access and metadata-only events map to `None`.
    pub fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            // mtime/chmod noise would otherwise retrigger builds endlessly
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// A filesystem change that triggers one asset's rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub asset: String,
    pub kind: ChangeKind,
    /// Changed paths that matched the asset's watch globs.
    pub paths: Vec<PathBuf>,
}
