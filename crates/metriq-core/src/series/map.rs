//! Insertion-ordered mapping from metric id to series

use std::collections::HashMap;

use super::MetricValueList;
use crate::models::MetricId;

/// Series keyed by metric id, iterated in insertion order.
///
/// Order matters: math nodes combine their operands in the order they were
/// produced.
#[derive(Debug, Clone, Default)]
pub struct SeriesMap {
    entries: Vec<(MetricId, MetricValueList)>,
    index: HashMap<MetricId, usize>,
}

impl SeriesMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no series
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace; a replaced entry keeps its position
    pub fn insert(&mut self, id: MetricId, list: MetricValueList) -> Option<MetricValueList> {
        if let Some(&pos) = self.index.get(&id) {
            return Some(std::mem::replace(&mut self.entries[pos].1, list));
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, list));
        None
    }

    /// Insert only when `id` is not present yet; returns whether it was inserted
    pub fn insert_if_absent(&mut self, id: MetricId, list: MetricValueList) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.insert(id, list);
        true
    }

    /// Append every entry of `other` whose id is not present yet
    pub fn merge_absent(&mut self, other: SeriesMap) {
        for (id, list) in other {
            self.insert_if_absent(id, list);
        }
    }

    /// Series for `id`
    pub fn get(&self, id: &MetricId) -> Option<&MetricValueList> {
        self.index.get(id).map(|&pos| &self.entries[pos].1)
    }

    /// Whether `id` is present
    pub fn contains_key(&self, id: &MetricId) -> bool {
        self.index.contains_key(id)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&MetricId, &MetricValueList)> {
        self.entries.iter().map(|(id, list)| (id, list))
    }

    /// Ids in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &MetricId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Series in insertion order
    pub fn values(&self) -> impl Iterator<Item = &MetricValueList> {
        self.entries.iter().map(|(_, list)| list)
    }

    /// Total number of samples across all series
    pub fn total_points(&self) -> usize {
        self.values().map(MetricValueList::size).sum()
    }
}

impl IntoIterator for SeriesMap {
    type Item = (MetricId, MetricValueList);
    type IntoIter = std::vec::IntoIter<(MetricId, MetricValueList)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(MetricId, MetricValueList)> for SeriesMap {
    fn from_iter<T: IntoIterator<Item = (MetricId, MetricValueList)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl Extend<(MetricId, MetricValueList)> for SeriesMap {
    fn extend<T: IntoIterator<Item = (MetricId, MetricValueList)>>(&mut self, iter: T) {
        for (id, list) in iter {
            self.insert(id, list);
        }
    }
}
