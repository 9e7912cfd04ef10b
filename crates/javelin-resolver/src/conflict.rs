//! Version conflict reporting for nearest-wins resolution.

use std::fmt;

/// All version displacements encountered during one resolution run.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// One artifact requested at a version other than the one resolved.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub group: String,
    pub artifact: String,
    pub requested: String,
    pub resolved: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(
                f,
                "  {}:{} requested {} but resolved {} ({})",
                c.group, c.artifact, c.requested, c.resolved, c.reason
            )?;
        }
        Ok(())
    }
}
