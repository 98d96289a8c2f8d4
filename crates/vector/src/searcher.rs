//! Fast vector searchers
//!
//! A [`VectorSearcher`] holds the vectors of one vector index and answers
//! nearest-neighbour queries. [`InMemorySearcher`] is an O(n) brute-force
//! implementation; [`SearcherKind`] picks an implementation at runtime and
//! [`SearcherRegistry`] maps vector-index identifiers to live searchers.
//!
//! ## Ranking
//!
//! Scores are normalized to "higher = more similar" for every measure.
//! Results are sorted by (score desc, id asc) so equal scores come back in
//! a stable order.

use crate::error::{VectorError, VectorResult};
use crate::measure::Measure;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Parallel lists of result ids and scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nearest {
    /// Result ids, best first
    pub ids: Vec<String>,
    /// Scores matching `ids`
    pub scores: Vec<f32>,
}

impl Nearest {
    /// Number of results
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing matched
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, score)` pairs, best first
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.ids.iter().map(String::as_str).zip(self.scores.iter().copied())
    }
}

/// Nearest-neighbour index over one vector index's vectors.
///
/// Implementations synchronize internally; every method takes `&self`.
pub trait VectorSearcher: Send + Sync {
    /// Insert or replace vectors
    fn add(&self, items: Vec<(String, Vec<f32>)>) -> VectorResult<()>;

    /// Remove vectors; returns how many existed
    fn delete(&self, ids: &[String]) -> VectorResult<usize>;

    /// Neighbours of an indexed vector. The vector itself is included.
    ///
    /// `within_ids` empty means unrestricted.
    fn find_nearest_from_id(
        &self,
        id: &str,
        within_ids: &[String],
        limit: usize,
    ) -> VectorResult<Nearest>;

    /// Neighbours of a raw query vector.
    ///
    /// `within_ids` empty means unrestricted.
    fn find_nearest_from_array(
        &self,
        vector: &[f32],
        within_ids: &[String],
        n: usize,
    ) -> VectorResult<Nearest>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    /// True when nothing is indexed
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension
    fn dimension(&self) -> usize;

    /// Similarity measure
    fn measure(&self) -> Measure;

    /// True when `id` is indexed
    fn contains(&self, id: &str) -> bool;
}

/// Brute-force searcher over an in-memory map.
///
/// Uses BTreeMap for deterministic iteration.
#[derive(Debug)]
pub struct InMemorySearcher {
    dimension: usize,
    measure: Measure,
    vectors: RwLock<BTreeMap<String, Vec<f32>>>,
}

impl InMemorySearcher {
    /// Empty searcher for vectors of `dimension`
    pub fn new(dimension: usize, measure: Measure) -> Self {
        Self {
            dimension,
            measure,
            vectors: RwLock::new(BTreeMap::new()),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorSearcher for InMemorySearcher {
    fn add(&self, items: Vec<(String, Vec<f32>)>) -> VectorResult<()> {
        for (_, v) in &items {
            self.check_dimension(v)?;
        }
        let mut vectors = self.vectors.write();
        for (id, v) in items {
            vectors.insert(id, v);
        }
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> VectorResult<usize> {
        let mut vectors = self.vectors.write();
        Ok(ids.iter().filter(|id| vectors.remove(*id).is_some()).count())
    }

    fn find_nearest_from_id(
        &self,
        id: &str,
        within_ids: &[String],
        limit: usize,
    ) -> VectorResult<Nearest> {
        let query = self
            .vectors
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| VectorError::VectorNotFound(id.to_string()))?;
        self.find_nearest_from_array(&query, within_ids, limit)
    }

    fn find_nearest_from_array(
        &self,
        vector: &[f32],
        within_ids: &[String],
        n: usize,
    ) -> VectorResult<Nearest> {
        self.check_dimension(vector)?;
        let allowed: HashSet<&str> = within_ids.iter().map(String::as_str).collect();

        let vectors = self.vectors.read();
        let mut scored: Vec<(&str, f32)> = vectors
            .iter()
            .filter(|(id, _)| allowed.is_empty() || allowed.contains(id.as_str()))
            .map(|(id, v)| (id.as_str(), self.measure.score(vector, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        scored.truncate(n);

        let mut out = Nearest::default();
        for (id, score) in scored {
            out.ids.push(id.to_string());
            out.scores.push(score);
        }
        Ok(out)
    }

    fn len(&self) -> usize {
        self.vectors.read().len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn measure(&self) -> Measure {
        self.measure
    }

    fn contains(&self, id: &str) -> bool {
        self.vectors.read().contains_key(id)
    }
}

/// Searcher implementation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearcherKind {
    /// Brute-force in-memory search
    #[default]
    InMemory,
}

impl SearcherKind {
    /// Create a searcher instance
    pub fn create(&self, dimension: usize, measure: Measure) -> Arc<dyn VectorSearcher> {
        match self {
            SearcherKind::InMemory => Arc::new(InMemorySearcher::new(dimension, measure)),
        }
    }
}

/// Live searchers keyed by vector-index identifier.
#[derive(Default)]
pub struct SearcherRegistry {
    searchers: DashMap<String, Arc<dyn VectorSearcher>>,
}

impl SearcherRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Searcher for a vector index
    pub fn get(&self, identifier: &str) -> VectorResult<Arc<dyn VectorSearcher>> {
        self.searchers
            .get(identifier)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| VectorError::SearcherNotFound(identifier.to_string()))
    }

    /// Register (or replace) the searcher for a vector index
    pub fn insert(&self, identifier: impl Into<String>, searcher: Arc<dyn VectorSearcher>) {
        self.searchers.insert(identifier.into(), searcher);
    }

    /// Drop the searcher for a vector index
    pub fn remove(&self, identifier: &str) -> bool {
        self.searchers.remove(identifier).is_some()
    }

    /// True when a searcher exists for `identifier`
    pub fn contains(&self, identifier: &str) -> bool {
        self.searchers.contains_key(identifier)
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.searchers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for SearcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearcherRegistry")
            .field("searchers", &self.identifiers())
            .finish()
    }
}
