//! Greedy descent, layered beam search, and the public `search` entry
//! point (spec.md §4.A.2).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use super::error::IndexError;
use super::graph::HnswIndex;
use super::node::NodeIdx;
use crate::metric::norm;

/// A node scored against a query, ordered by distance ascending and then
/// by arena index ascending for deterministic tie-breaking.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Distance to the query.
    pub distance: f32,
    /// Arena identity of the candidate.
    pub idx: NodeIdx,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.idx == other.idx
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then_with(|| self.idx.cmp(&other.idx))
    }
}

/// A result handed back to the caller: their id plus the distance found.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Caller-supplied id.
    pub id: u64,
    /// Distance from the query.
    pub distance: f32,
}

impl<V> HnswIndex<V> {
    fn distance_to(&self, query: &[f32], query_norm: f32, idx: NodeIdx) -> f32 {
        let node = self.node(idx);
        node.vector.distance(query, query_norm, self.config.metric)
    }

    /// Beam search of width `ef` over a single layer, starting from
    /// `entry_points`. Returns up to `ef` candidates sorted closest-first.
    pub(crate) fn search_layer(
        &self,
        query: &[f32],
        query_norm: f32,
        entry_points: &[NodeIdx],
        ef: usize,
        layer: u8,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<NodeIdx> = entry_points.iter().copied().collect();
        let mut candidates: BinaryHeap<std::cmp::Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &idx in entry_points {
            let node = self.node(idx);
            if node.is_tombstoned() {
                continue;
            }
            let c = Candidate { distance: self.distance_to(query, query_norm, idx), idx };
            candidates.push(std::cmp::Reverse(c));
            results.push(c);
        }

        while let Some(std::cmp::Reverse(current)) = candidates.pop() {
            if let Some(&worst) = results.peek() {
                if results.len() >= ef && current.distance > worst.distance {
                    break;
                }
            }

            let node = self.node(current.idx);
            if layer as usize >= node.neighbors.len() {
                continue;
            }
            let neighbor_ids: Vec<NodeIdx> =
                node.neighbors[layer as usize].read().unwrap().clone();

            for nb_idx in neighbor_ids {
                if !visited.insert(nb_idx) {
                    continue;
                }
                let nb = self.node(nb_idx);
                if nb.is_tombstoned() {
                    continue;
                }
                let d = self.distance_to(query, query_norm, nb_idx);
                let worst = results.peek().copied();
                if results.len() < ef || worst.is_some_and(|w| d < w.distance) {
                    let c = Candidate { distance: d, idx: nb_idx };
                    candidates.push(std::cmp::Reverse(c));
                    results.push(c);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<Candidate> = results.into_vec();
        out.sort();
        out
    }

    /// Greedy descent from the entry point down to (but not including)
    /// `target_layer`, returning the single closest node found at each
    /// layer above `target_layer` as the entry point for the next.
    pub(crate) fn greedy_descend(
        &self,
        query: &[f32],
        query_norm: f32,
        from: NodeIdx,
        from_layer: u8,
        target_layer: u8,
    ) -> NodeIdx {
        let mut best = from;
        let mut best_dist = self.distance_to(query, query_norm, from);
        let mut layer = from_layer;
        while layer > target_layer {
            loop {
                let node = self.node(best);
                let neighbor_ids: Vec<NodeIdx> = if (layer as usize) < node.neighbors.len() {
                    node.neighbors[layer as usize].read().unwrap().clone()
                } else {
                    Vec::new()
                };
                let mut improved = false;
                for nb_idx in neighbor_ids {
                    let nb = self.node(nb_idx);
                    if nb.is_tombstoned() {
                        continue;
                    }
                    let d = self.distance_to(query, query_norm, nb_idx);
                    if d < best_dist {
                        best = nb_idx;
                        best_dist = d;
                        improved = true;
                    }
                }
                if !improved {
                    break;
                }
            }
            layer -= 1;
        }
        best
    }

    /// Approximate k-nearest-neighbor search.
    ///
    /// `slot_hint`: pass `Some(slot)` to reuse a reader slot already
    /// acquired via [`HnswIndex::acquire_read_slot`] (the caller releases
    /// it); pass `None` to have this call acquire and release one itself.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        slot_hint: Option<usize>,
        ef_search: Option<u32>,
    ) -> Result<Vec<SearchResult>, IndexError> {
        self.validate_dims(query)?;
        let entry = self.entry.read().unwrap().ok_or(IndexError::EmptyIndex)?;

        let owned_slot = if slot_hint.is_none() { Some(self.acquire_read_slot()?) } else { None };

        let query_norm = norm(query);
        let entry_node = self.node(entry);
        let entry_level = entry_node.level;
        let best = self.greedy_descend(query, query_norm, entry, entry_level, 0);

        let ef = (ef_search.unwrap_or(self.config.ef_search) as usize).max(k);
        let mut results = self.search_layer(query, query_norm, &[best], ef, 0);
        results.retain(|c| !self.node(c.idx).is_tombstoned());
        results.truncate(k);

        if let Some(s) = owned_slot {
            self.release_read_slot(s);
        }

        Ok(results
            .into_iter()
            .map(|c| SearchResult { id: self.node(c.idx).id, distance: c.distance })
            .collect())
    }
}
