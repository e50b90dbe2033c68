//! Exact minimum-cost bipartite matching with a cost limit.

use ndarray::Array2;

/// Outcome of matching one set of tracks against one set of detections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the assignment problem for `cost_matrix` (tracks x detections).
///
/// The matrix is extended to `(N + M) x (N + M)` so every track and every
/// detection may also be left unmatched at a cost of `thresh / 2` each.
/// A pair is therefore only matched when its cost beats leaving both sides
/// unmatched, and never when it exceeds `thresh`. The Jonker-Volgenant
/// solver is deterministic for a fixed input order.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows + num_cols;
    let limit = f64::from(thresh.max(0.0)) / 2.0;
    let mut extended = Array2::<f64>::from_elem((size, size), limit);
    for i in 0..num_rows {
        for j in 0..num_cols {
            extended[[i, j]] = f64::from(cost_matrix[[i, j]]);
        }
    }
    for i in num_rows..size {
        for j in num_cols..size {
            extended[[i, j]] = 0.0;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&extended) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().take(num_rows).enumerate() {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            log::warn!(
                "assignment solver failed ({err:?}), leaving {num_rows}x{num_cols} block unmatched"
            );
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::matching::UNMATCHABLE;
    use ndarray::array;

    #[test]
    fn test_empty_matrix() {
        let result = linear_assignment(&Array2::zeros((0, 3)), 0.5);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

        let result = linear_assignment(&Array2::zeros((2, 0)), 0.5);
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_optimal_not_greedy() {
        // Greedy would take (0, 0) first and be left with (1, 1) = 0.9.
        let costs = array![[0.1, 0.2], [0.15, 0.9]];
        let result = linear_assignment(&costs, 1.0);
        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_tracks.is_empty());
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_gated_pairs_never_match() {
        let costs = array![[0.2, UNMATCHABLE], [UNMATCHABLE, UNMATCHABLE]];
        let result = linear_assignment(&costs, 0.8);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_cost_above_threshold_is_unmatched() {
        let costs = array![[0.9, 0.95]];
        let result = linear_assignment(&costs, 0.8);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0, 1]);
    }

    #[test]
    fn test_rectangular() {
        let costs = array![[0.5, 0.1], [0.05, 0.6], [0.3, 0.3]];
        let result = linear_assignment(&costs, 0.8);
        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 1), (1, 0)]);
        assert_eq!(result.unmatched_tracks, vec![2]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_deterministic_on_ties() {
        let costs = Array2::from_elem((3, 3), 0.25f32);
        let first = linear_assignment(&costs, 0.8);
        for _ in 0..5 {
            assert_eq!(linear_assignment(&costs, 0.8), first);
        }
        assert_eq!(first.matches.len(), 3);
    }
}
