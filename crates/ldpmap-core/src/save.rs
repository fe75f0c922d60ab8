/// Result of a save that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Something was written.
    Saved,
    /// Preconditions for durability were not met; nothing was written.
    Skipped(SkipReason),
}

impl SaveOutcome {
    pub fn is_saved(self) -> bool {
        matches!(self, Self::Saved)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A new file without content is never made durable.
    NoContent,
    /// Metadata cannot exist remotely before the file it describes.
    OwnerNotPersisted,
    /// Already persisted and nothing changed locally.
    Unchanged,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoContent => write!(f, "new file has no content"),
            Self::OwnerNotPersisted => write!(f, "owning file is not persisted"),
            Self::Unchanged => write!(f, "nothing changed"),
        }
    }
}
