//! Neighbor selection heuristic (spec.md §4.A.2).
//!
//! Greedy admit-if-closer-to-query-than-to-any-admitted-neighbor selection,
//! the heuristic variant of the HNSW paper's neighbor selection (preferred
//! over plain closest-k because it keeps the graph's long-range edges).

use crate::hnsw::node::NodeIdx;

/// A candidate with its distance to the point being linked, ascending-sorted
/// input expected.
#[derive(Debug, Clone, Copy)]
pub struct Scored {
    /// Arena identity of the candidate.
    pub idx: NodeIdx,
    /// Distance from the candidate to the point being linked.
    pub distance: f32,
}

/// Select up to `cap` neighbors from `candidates` (closest-first) for the
/// point being linked, using pairwise distances supplied by `dist_between`.
///
/// A candidate is admitted if it is closer to the linked point than it is
/// to every already-admitted neighbor; this keeps a spread of directions
/// instead of a tight cluster of near-duplicates.
pub fn select_neighbors<F>(candidates: &[Scored], cap: usize, mut dist_between: F) -> Vec<NodeIdx>
where
    F: FnMut(NodeIdx, NodeIdx) -> f32,
{
    let mut selected: Vec<Scored> = Vec::with_capacity(cap.min(candidates.len()));
    for &cand in candidates {
        if selected.len() >= cap {
            break;
        }
        let admit = selected.iter().all(|&sel| cand.distance < dist_between(cand.idx, sel.idx));
        if admit {
            selected.push(cand);
        }
    }
    // Backfill with the closest still-unselected candidates if the heuristic
    // pruned below capacity, so well-connected regions don't starve.
    if selected.len() < cap {
        for &cand in candidates {
            if selected.len() >= cap {
                break;
            }
            if !selected.iter().any(|s| s.idx == cand.idx) {
                selected.push(cand);
            }
        }
    }
    selected.into_iter().map(|s| s.idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_capacity() {
        let candidates: Vec<Scored> = (0..10)
            .map(|i| Scored { idx: NodeIdx(i), distance: i as f32 })
            .collect();
        let chosen = select_neighbors(&candidates, 3, |_, _| 100.0);
        assert_eq!(chosen.len(), 3);
    }

    #[test]
    fn prunes_near_duplicates() {
        // Candidates 0 and 1 are mutually very close (distance 0.01), so
        // admitting 0 first should prune 1 even though it's the next
        // closest to the query.
        let candidates = vec![
            Scored { idx: NodeIdx(0), distance: 1.0 },
            Scored { idx: NodeIdx(1), distance: 1.1 },
            Scored { idx: NodeIdx(2), distance: 5.0 },
        ];
        let chosen = select_neighbors(&candidates, 2, |a, b| {
            if (a == NodeIdx(0) && b == NodeIdx(1)) || (a == NodeIdx(1) && b == NodeIdx(0)) {
                0.01
            } else {
                10.0
            }
        });
        assert_eq!(chosen, vec![NodeIdx(0), NodeIdx(2)]);
    }
}
