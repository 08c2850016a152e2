use std::fmt::Display;
use tokio::time::Instant;
use uuid::Uuid;

use crate::store::{FieldOp, FieldUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditId(Uuid);

impl EditId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EditId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A local mutation rendered ahead of the remote acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticEdit {
    pub id: EditId,
    /// Key of the document the edit applies to
    pub target_key: String,
    pub field: String,
    pub op: FieldOp,
    pub issued_at: Instant,
}

impl OptimisticEdit {
    pub fn new(target_key: impl Into<String>, field: impl Into<String>, op: FieldOp) -> Self {
        Self {
            id: EditId::new(),
            target_key: target_key.into(),
            field: field.into(),
            op,
            issued_at: Instant::now(),
        }
    }

    pub fn touches(&self, target_key: &str, field: &str) -> bool {
        self.target_key == target_key && self.field == field
    }

    /// The remote write equivalent to this edit
    pub fn to_update(&self) -> FieldUpdate {
        FieldUpdate::new(self.field.clone(), self.op.clone())
    }
}

/// Where an edit is in its round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// Rendered, write not yet issued
    Staged,
    /// Write issued, no answer yet
    InFlight,
    /// Write accepted, waiting for a snapshot that shows it
    Acknowledged,
}
