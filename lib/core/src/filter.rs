// Record filters applied during search, before top-k selection
use crate::record::{ConditionLabel, RecordId, RecordMeta};
use ahash::AHashSet;

pub trait RecordFilter: Send + Sync {
    fn matches(&self, meta: &RecordMeta) -> bool;
}

impl<F> RecordFilter for F
where
    F: Fn(&RecordMeta) -> bool + Send + Sync,
{
    fn matches(&self, meta: &RecordMeta) -> bool {
        self(meta)
    }
}

/// Keep only records labelled with one of the given conditions
pub struct ConditionFilter {
    conditions: Vec<ConditionLabel>,
}

impl ConditionFilter {
    pub fn new(conditions: impl IntoIterator<Item = ConditionLabel>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }
}

impl RecordFilter for ConditionFilter {
    fn matches(&self, meta: &RecordMeta) -> bool {
        self.conditions.contains(&meta.condition)
    }
}

/// Drop the listed records from the result set
pub struct ExcludeIds {
    ids: AHashSet<RecordId>,
}

impl ExcludeIds {
    pub fn new(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl RecordFilter for ExcludeIds {
    fn matches(&self, meta: &RecordMeta) -> bool {
        !self.ids.contains(&meta.id)
    }
}
