//! Insertion, optimistic commit, deletion, and validation
//! (spec.md §4.A.2, §4.A.3, §5, §6).

use std::sync::atomic::Ordering;
use std::sync::Mutex;

use rand::Rng;

use super::error::IndexError;
use super::graph::HnswIndex;
use super::neighbor::{select_neighbors, Scored};
use super::node::NodeIdx;
use super::vector::StoredVector;
use crate::metric::norm;

/// Layer-by-layer neighbor candidates captured during the read-only search
/// phase of [`HnswIndex::prepare_insert`], each tagged with the neighbor's
/// version observed at that time.
pub struct InsertContext<V> {
    id: u64,
    value: Mutex<Option<V>>,
    vector: StoredVector,
    norm: f32,
    level: u8,
    /// `layer_candidates[l]` is the chosen neighbor set for layer `l`,
    /// each paired with the version observed on that neighbor.
    layer_candidates: Vec<Vec<(NodeIdx, u64)>>,
    entry_at_prepare: Option<NodeIdx>,
}

impl<V> HnswIndex<V> {
    fn sample_level(&self) -> u8 {
        let mut rng = self.rng.lock().unwrap();
        let r: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        let level = (-r.ln() * self.config.level_mult()) as u8;
        level.min(self.config.max_level)
    }

    fn distance_between(&self, a: NodeIdx, b: NodeIdx) -> f32 {
        let a_vec = self.node(a).vector.decode();
        let a_norm = self.node(a).norm;
        self.node(b).vector.distance(&a_vec, a_norm, self.config.metric)
    }

    /// Search-phase candidate selection for a new point at `vector`/`level`,
    /// shared by both the plain locked insert and the lock-free prepare
    /// phase. Returns `layer_candidates[l]` for `l` in `0..=min(level,
    /// entry_level)`.
    fn select_insert_candidates(
        &self,
        query: &[f32],
        query_norm: f32,
        level: u8,
    ) -> (Vec<Vec<(NodeIdx, u64)>>, Option<NodeIdx>) {
        let entry = *self.entry.read().unwrap();
        let Some(entry) = entry else {
            return (Vec::new(), None);
        };
        let entry_node = self.node(entry);
        let entry_level = entry_node.level;

        let start = self.greedy_descend(
            query,
            query_norm,
            entry,
            entry_level,
            level.min(entry_level),
        );

        let mut layer_candidates = Vec::new();
        let mut cur_entry = vec![start];
        let top = level.min(entry_level);
        for layer in (0..=top).rev() {
            let found = self.search_layer(
                query,
                query_norm,
                &cur_entry,
                self.config.ef_construction as usize,
                layer,
            );
            let cap = self.config.neighbor_cap(layer);
            let scored: Vec<Scored> =
                found.iter().map(|c| Scored { idx: c.idx, distance: c.distance }).collect();
            let chosen = select_neighbors(&scored, cap, |a, b| self.distance_between(a, b));
            let with_versions: Vec<(NodeIdx, u64)> = chosen
                .iter()
                .map(|&idx| (idx, self.node(idx).version.load(Ordering::Acquire)))
                .collect();
            cur_entry = chosen;
            layer_candidates.push((layer, with_versions));
        }
        layer_candidates.sort_by_key(|(l, _)| *l);
        (layer_candidates.into_iter().map(|(_, v)| v).collect(), Some(entry))
    }

    /// Link a newly-arena'd node to the neighbor sets chosen during the
    /// search phase, and prune each linked neighbor back down to capacity.
    /// Caller must hold `write_lock`.
    fn link_new_node(&self, new_idx: NodeIdx, layer_candidates: &[Vec<(NodeIdx, u64)>]) {
        let new_node = self.node(new_idx);
        for (layer, candidates) in layer_candidates.iter().enumerate() {
            let layer = layer as u8;
            let chosen: Vec<NodeIdx> = candidates.iter().map(|&(idx, _)| idx).collect();
            *new_node.neighbors[layer as usize].write().unwrap() = chosen.clone();

            for &nb_idx in &chosen {
                let nb = self.node(nb_idx);
                if (layer as usize) >= nb.neighbors.len() {
                    continue;
                }
                let mut nb_list = nb.neighbors[layer as usize].write().unwrap();
                nb_list.push(new_idx);
                let cap = self.config.neighbor_cap(layer);
                if nb_list.len() > cap {
                    let scored: Vec<Scored> = nb_list
                        .iter()
                        .map(|&idx| Scored { idx, distance: self.distance_between(nb_idx, idx) })
                        .collect();
                    let mut scored = scored;
                    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                    *nb_list = select_neighbors(&scored, cap, |a, b| self.distance_between(a, b));
                }
                drop(nb_list);
                nb.version.fetch_add(1, Ordering::AcqRel);
            }
        }

        let mut entry = self.entry.write().unwrap();
        let replace = match *entry {
            None => true,
            Some(cur) => new_node.level > self.node(cur).level,
        };
        if replace {
            *entry = Some(new_idx);
        }
    }

    /// Insert `v`/`value` under `id`, taking the write lock for the whole
    /// operation. Always succeeds or returns an error; never conflicts
    /// since nothing else can interleave.
    pub fn insert(&self, v: &[f32], value: V, id: u64) -> Result<NodeIdx, IndexError> {
        self.validate_dims(v)?;
        let _guard = self.write_lock.lock().unwrap();
        self.insert_locked(v, value, id)
    }

    fn insert_locked(&self, v: &[f32], value: V, id: u64) -> Result<NodeIdx, IndexError> {
        if self.id_index.read().unwrap().contains_key(&id) {
            return Err(IndexError::DuplicateId { id });
        }
        let level = self.sample_level();
        let query_norm = norm(v);
        let (layer_candidates, _) = self.select_insert_candidates(v, query_norm, level);

        let vector = StoredVector::encode(v, self.config.quantization);
        let new_idx = self.encode_and_link_new_slot(id, value, vector, query_norm, level);
        self.link_new_node(new_idx, &layer_candidates);
        log::debug!("inserted id={id} at level={level}");
        Ok(new_idx)
    }

    /// Read-only search phase of optimistic insert: no locks held across
    /// calls, safe to run concurrently with other readers and writers.
    pub fn prepare_insert(&self, v: &[f32], value: V, id: u64) -> Result<InsertContext<V>, IndexError> {
        self.validate_dims(v)?;
        if self.id_index.read().unwrap().contains_key(&id) {
            return Err(IndexError::DuplicateId { id });
        }
        let slot = self.acquire_read_slot()?;
        let level = self.sample_level();
        let query_norm = norm(v);
        let (layer_candidates, entry_at_prepare) =
            self.select_insert_candidates(v, query_norm, level);
        self.release_read_slot(slot);

        Ok(InsertContext {
            id,
            value: Mutex::new(Some(value)),
            vector: StoredVector::encode(v, self.config.quantization),
            norm: query_norm,
            level,
            layer_candidates,
            entry_at_prepare,
        })
    }

    /// Commit an [`InsertContext`] produced by [`Self::prepare_insert`].
    ///
    /// Returns `Ok(Some(idx))` on success, `Ok(None)` if any candidate
    /// neighbor's version changed since the search phase (the caller
    /// should retry, typically by falling back to [`Self::insert`]), or
    /// an error for duplicate ids discovered at commit time.
    pub fn try_commit_insert(&self, ctx: InsertContext<V>) -> Result<Option<NodeIdx>, IndexError> {
        let _guard = self.write_lock.lock().unwrap();

        if self.id_index.read().unwrap().contains_key(&ctx.id) {
            return Err(IndexError::DuplicateId { id: ctx.id });
        }

        let entry_now = *self.entry.read().unwrap();
        if entry_now != ctx.entry_at_prepare {
            log::trace!("commit conflict: entry point moved during prepare_insert");
            return Ok(None);
        }

        for layer in &ctx.layer_candidates {
            for &(idx, observed) in layer {
                let current = self.node(idx).version.load(Ordering::Acquire);
                if current != observed {
                    log::trace!("commit conflict on node {idx:?}: version {current} != {observed}");
                    return Ok(None);
                }
            }
        }

        let value = ctx.value.lock().unwrap().take().expect("value taken exactly once");
        let new_idx =
            self.encode_and_link_new_slot(ctx.id, value, ctx.vector, ctx.norm, ctx.level);
        self.link_new_node(new_idx, &ctx.layer_candidates);
        log::debug!("committed optimistic insert id={}", ctx.id);
        Ok(Some(new_idx))
    }

    fn unlink_enum(&self, idx: NodeIdx) {
        let node = self.node(idx);
        let prev = *node.enum_prev.lock().unwrap();
        let next = *node.enum_next.lock().unwrap();
        match prev {
            Some(p) => *self.node(p).enum_next.lock().unwrap() = next,
            None => *self.enum_head.lock().unwrap() = next,
        }
        match next {
            Some(n) => *self.node(n).enum_prev.lock().unwrap() = prev,
            None => *self.enum_tail.lock().unwrap() = prev,
        }
    }

    fn pick_new_entry(&self) -> Option<NodeIdx> {
        let mut best: Option<NodeIdx> = None;
        let mut cur = *self.enum_head.lock().unwrap();
        while let Some(idx) = cur {
            let node = self.node(idx);
            if !node.is_tombstoned() {
                let better = match best {
                    None => true,
                    Some(b) => node.level > self.node(b).level,
                };
                if better {
                    best = Some(idx);
                }
            }
            cur = *node.enum_next.lock().unwrap();
        }
        best
    }

    /// Tombstone the node with arena identity `idx`, repair its neighbors'
    /// adjacency, and reclaim any payloads (including this one, if no
    /// reader can still be observing it) via `disposer`.
    pub fn delete_node(&self, idx: NodeIdx, mut disposer: impl FnMut(V)) -> Result<(), IndexError> {
        let _guard = self.write_lock.lock().unwrap();
        let node = self.node(idx);
        if node.tombstoned.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let epoch = self.epoch.advance();
        node.deletion_epoch.store(epoch, Ordering::Release);

        for layer in 0..=node.level {
            let deleted_neighbors: Vec<NodeIdx> =
                node.neighbors[layer as usize].read().unwrap().clone();
            for &nb_idx in &deleted_neighbors {
                let nb = self.node(nb_idx);
                if nb.is_tombstoned() {
                    continue;
                }
                let mut nb_list = nb.neighbors[layer as usize].write().unwrap();
                nb_list.retain(|&x| x != idx);
                let mut candidates = nb_list.clone();
                for &c in &deleted_neighbors {
                    if c != nb_idx && c != idx && !candidates.contains(&c) {
                        candidates.push(c);
                    }
                }
                let cap = self.config.neighbor_cap(layer);
                *nb_list = if candidates.len() > cap {
                    let scored: Vec<Scored> = candidates
                        .iter()
                        .map(|&c| Scored { idx: c, distance: self.distance_between(nb_idx, c) })
                        .collect();
                    select_neighbors(&scored, cap, |a, b| self.distance_between(a, b))
                } else {
                    candidates
                };
                drop(nb_list);
                nb.version.fetch_add(1, Ordering::AcqRel);
            }
        }

        node.version.fetch_add(1, Ordering::AcqRel);
        self.unlink_enum(idx);
        self.id_index.write().unwrap().remove(&node.id);
        self.node_count().fetch_sub(1, Ordering::AcqRel);

        let mut entry = self.entry.write().unwrap();
        if *entry == Some(idx) {
            *entry = self.pick_new_entry();
        }
        drop(entry);

        self.pending_free.lock().unwrap().push_back((idx, epoch));
        self.reclaim(&mut disposer);
        log::debug!("deleted id={} (node {idx:?})", node.id);
        Ok(())
    }

    fn reclaim(&self, disposer: &mut impl FnMut(V)) {
        let min_epoch = self.slots.min_active_epoch();
        let mut pending = self.pending_free.lock().unwrap();
        let mut still_pending = std::collections::VecDeque::new();
        while let Some((idx, epoch)) = pending.pop_front() {
            if epoch < min_epoch {
                if let Some(v) = self.node(idx).value.lock().unwrap().take() {
                    disposer(v);
                }
            } else {
                log::trace!("reclamation deferred for node {idx:?}: readers still in epoch {epoch}");
                still_pending.push_back((idx, epoch));
            }
        }
        *pending = still_pending;
    }

    /// Hand every remaining payload (tombstoned or live) to `disposer`.
    /// Intended for use when discarding an index outright.
    pub fn free(&self, mut disposer: impl FnMut(V)) {
        let nodes = self.nodes.read().unwrap();
        for node in nodes.iter() {
            if let Some(v) = node.value.lock().unwrap().take() {
                disposer(v);
            }
        }
    }

    /// Structural self-check: connectivity of layer 0 among live nodes
    /// reachable from the entry point, and whether every neighbor link is
    /// reciprocated.
    #[must_use]
    pub fn validate_graph(&self) -> (usize, bool) {
        let Some(entry) = *self.entry.read().unwrap() else {
            return (0, true);
        };

        let mut visited = std::collections::HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(entry);
        visited.insert(entry);
        while let Some(idx) = queue.pop_front() {
            let node = self.node(idx);
            if node.is_tombstoned() || node.neighbors.is_empty() {
                continue;
            }
            for &nb in node.neighbors[0].read().unwrap().iter() {
                if visited.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }

        let mut reciprocal = true;
        let nodes = self.nodes.read().unwrap();
        'outer: for (i, node) in nodes.iter().enumerate() {
            if node.is_tombstoned() {
                continue;
            }
            let me = NodeIdx(i as u32);
            for layer_list in &node.neighbors {
                for &nb_idx in layer_list.read().unwrap().iter() {
                    let nb = self.node(nb_idx);
                    let layer = node.neighbors.iter().position(|l| std::ptr::eq(l, layer_list));
                    let Some(layer) = layer else { continue };
                    if layer >= nb.neighbors.len()
                        || !nb.neighbors[layer].read().unwrap().contains(&me)
                    {
                        reciprocal = false;
                        break 'outer;
                    }
                }
            }
        }

        (visited.len(), reciprocal)
    }

    /// Sample `sample_n` live nodes, run approximate and brute-force
    /// search for each, and report mean recall@10.
    #[must_use]
    pub fn test_graph_recall(&self, sample_n: usize, verbose: bool) -> f32 {
        const K: usize = 10;
        let live: Vec<NodeIdx> = {
            let nodes = self.nodes.read().unwrap();
            (0..nodes.len())
                .map(|i| NodeIdx(i as u32))
                .filter(|&idx| !self.node(idx).is_tombstoned())
                .collect()
        };
        if live.is_empty() {
            return 1.0;
        }

        let sample_n = sample_n.min(live.len());
        let sampled: Vec<NodeIdx> = {
            let mut rng = self.rng.lock().unwrap();
            let mut pool = live.clone();
            let mut out = Vec::with_capacity(sample_n);
            for _ in 0..sample_n {
                let i = rng.gen_range(0..pool.len());
                out.push(pool.swap_remove(i));
            }
            out
        };

        let mut total_recall = 0.0;
        for query_idx in &sampled {
            let query = self.node(*query_idx).vector.decode();
            let approx: std::collections::HashSet<u64> = self
                .search(&query, K, None, None)
                .map(|rs| rs.into_iter().map(|r| r.id).collect())
                .unwrap_or_default();

            let mut exact = self.brute_force_distances(&live, &query);
            exact.sort_by(|a, b| a.0.total_cmp(&b.0));
            let exact_top: std::collections::HashSet<u64> =
                exact.into_iter().take(K).map(|(_, id)| id).collect();

            let hits = approx.intersection(&exact_top).count();
            let recall = hits as f32 / exact_top.len().max(1) as f32;
            total_recall += recall;
            if verbose {
                log::debug!("recall for node {query_idx:?}: {recall}");
            }
        }

        total_recall / sampled.len() as f32
    }

    /// The brute-force half of the recall self-test: exact distance from
    /// `query` to every live node. Runs across `rayon`'s pool when the
    /// `parallel` feature is enabled, since this is the one place the
    /// self-test does real O(n) work per query.
    #[cfg(feature = "parallel")]
    fn brute_force_distances(&self, live: &[NodeIdx], query: &[f32]) -> Vec<(f32, u64)> {
        use rayon::prelude::*;
        let query_norm = norm(query);
        live.par_iter()
            .map(|&idx| {
                let node = self.node(idx);
                (node.vector.distance(query, query_norm, self.config.metric), node.id)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn brute_force_distances(&self, live: &[NodeIdx], query: &[f32]) -> Vec<(f32, u64)> {
        let query_norm = norm(query);
        live.iter()
            .map(|&idx| {
                let node = self.node(idx);
                (node.vector.distance(query, query_norm, self.config.metric), node.id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::{HnswConfig, Quantization};
    use super::*;

    fn small_index() -> HnswIndex<u64> {
        HnswIndex::with_seed(HnswConfig::new(2, Quantization::F32), 42)
    }

    #[test]
    fn insert_then_search_finds_self() {
        let idx = small_index();
        idx.insert(&[1.0, 0.0], 1, 1).unwrap();
        idx.insert(&[0.0, 1.0], 2, 2).unwrap();
        idx.insert(&[1.0, 1.0], 3, 3).unwrap();

        let results = idx.search(&[1.0, 0.0], 1, None, None).unwrap();
        assert_eq!(results[0].id, 1);
        assert!(results[0].distance < 1e-4);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let idx = small_index();
        idx.insert(&[1.0, 0.0], 1, 1).unwrap();
        assert_eq!(idx.insert(&[0.0, 1.0], 2, 1), Err(IndexError::DuplicateId { id: 1 }));
    }

    #[test]
    fn delete_removes_node_and_calls_disposer() {
        let idx = small_index();
        idx.insert(&[1.0, 0.0], 10, 1).unwrap();
        idx.insert(&[0.0, 1.0], 20, 2).unwrap();
        let node_idx = idx.id_to_idx(1).unwrap();

        let mut disposed = Vec::new();
        idx.delete_node(node_idx, |v| disposed.push(v)).unwrap();

        assert_eq!(disposed, vec![10]);
        assert_eq!(idx.len(), 1);
        assert!(idx.id_to_idx(1).is_none());
    }

    #[test]
    fn validate_graph_reports_full_connectivity() {
        let idx = small_index();
        for i in 0..20u64 {
            idx.insert(&[i as f32, (i * 2) as f32], i, i).unwrap();
        }
        let (connected, reciprocal) = idx.validate_graph();
        assert_eq!(connected, 20);
        assert!(reciprocal);
    }

    #[test]
    fn optimistic_commit_succeeds_without_conflict() {
        let idx = small_index();
        idx.insert(&[1.0, 0.0], 1, 1).unwrap();
        let ctx = idx.prepare_insert(&[0.0, 1.0], 2, 2).unwrap();
        let committed = idx.try_commit_insert(ctx).unwrap();
        assert!(committed.is_some());
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn recall_on_small_exact_index_is_perfect() {
        let idx = small_index();
        for i in 0..30u64 {
            idx.insert(&[i as f32, -(i as f32)], i, i).unwrap();
        }
        let recall = idx.test_graph_recall(10, false);
        assert!(recall > 0.9, "recall was {recall}");
    }
}
