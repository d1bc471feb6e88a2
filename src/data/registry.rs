use std::collections::{BTreeMap, BTreeSet};

use crate::data::model::EntityTable;
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// TableRegistry – the immutable per-session table collection
// ---------------------------------------------------------------------------

/// Sheet name of the aggregate entity. Loaded and stored, but never part of
/// the selectable set.
pub const AGGREGATE_ENTITY: &str = "TOTAL";

/// All entity tables of one analysis session.
///
/// Populated exactly once from the loader and read-only afterwards; every
/// analysis component takes it by shared reference. Safe to share across
/// sessions without locking because no writer exists after construction.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, EntityTable>,
}

impl TableRegistry {
    pub fn new(tables: Vec<EntityTable>) -> Self {
        let tables = tables
            .into_iter()
            .map(|t| (t.entity().to_string(), t))
            .collect();
        TableRegistry { tables }
    }

    /// Selectable partner entities, sorted; the aggregate entry is excluded.
    pub fn list_entities(&self) -> Vec<&str> {
        self.tables
            .keys()
            .map(String::as_str)
            .filter(|&name| name != AGGREGATE_ENTITY)
            .collect()
    }

    /// Fetch a partner's table. The aggregate entity is not selectable and
    /// reports [`AnalysisError::UnknownEntity`] like any absent name.
    pub fn get(&self, entity: &str) -> Result<&EntityTable, AnalysisError> {
        if entity == AGGREGATE_ENTITY {
            return Err(AnalysisError::UnknownEntity(entity.to_string()));
        }
        self.tables
            .get(entity)
            .ok_or_else(|| AnalysisError::UnknownEntity(entity.to_string()))
    }

    /// Sorted union of years across all selectable entities, for the year
    /// picker.
    pub fn years(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self
            .tables
            .iter()
            .filter(|(name, _)| name.as_str() != AGGREGATE_ENTITY)
            .flat_map(|(_, table)| table.years().iter().copied())
            .collect();
        set.into_iter().collect()
    }

    /// Number of stored tables, aggregate included.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
