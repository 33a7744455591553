//! The patient roster bounding the set of valid patient ids.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use eicu_model::PatientId;

use crate::chunked::{RecordChunks, get_string};
use crate::error::Result;

/// Known patient ids in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PatientRoster {
    ids: Vec<PatientId>,
    positions: HashMap<PatientId, usize>,
    duplicates: usize,
}

impl PatientRoster {
    /// Reads the id column of the roster table in chunks. Blank ids are
    /// ignored; repeated ids keep their first occurrence.
    pub fn load(path: &Path, id_column: &str, chunk_rows: usize) -> Result<Self> {
        let mut chunks = RecordChunks::open(path, chunk_rows)?;
        let column = chunks.require_column(id_column)?;
        let mut roster = Self::default();
        while let Some(records) = chunks.next_chunk()? {
            for (_, record) in &records {
                if let Some(id) = get_string(record, column).and_then(|raw| PatientId::new(raw).ok()) {
                    roster.insert(id);
                }
            }
        }
        if roster.duplicates > 0 {
            warn!(
                path = %path.display(),
                duplicates = roster.duplicates,
                "duplicate patient ids in roster, keeping first"
            );
        }
        info!(path = %path.display(), patients = roster.len(), "loaded patient roster");
        Ok(roster)
    }

    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = PatientId>,
    {
        let mut roster = Self::default();
        for id in ids {
            roster.insert(id);
        }
        roster
    }

    fn insert(&mut self, id: PatientId) {
        if self.positions.contains_key(&id) {
            self.duplicates += 1;
            return;
        }
        self.positions.insert(id.clone(), self.ids.len());
        self.ids.push(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// First-seen position of a patient, used to index per-patient buffers.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn ids(&self) -> &[PatientId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids dropped because they were already seen.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PatientId {
        PatientId::new(raw).expect("id")
    }

    #[test]
    fn keeps_first_occurrence_order() {
        let roster = PatientRoster::from_ids([id("3"), id("1"), id("3"), id("2")]);
        let ids: Vec<&str> = roster.ids().iter().map(PatientId::as_str).collect();
        assert_eq!(ids, ["3", "1", "2"]);
        assert_eq!(roster.duplicates(), 1);
        assert!(roster.contains("2"));
        assert!(!roster.contains("4"));
        assert_eq!(roster.position("1"), Some(1));
    }
}
