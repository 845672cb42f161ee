//! Globally optimal one-to-one assignment.
//!
//! Minimum-cost bipartite matching via the Hungarian algorithm in its
//! potentials formulation (O(n³)). Rows are references in sorted id
//! order, columns candidates in sorted id order. Inadmissible pairs carry
//! [`UNASSIGNABLE`] cost; assignments landing on such a cell are stripped
//! from the result, so a row can legitimately end up unmatched.
//!
//! Greedy best-first matching is not an acceptable substitute here: it
//! traps strong candidates with merely good references and contradicts
//! the audit semantics, which assume competition losses are real optima.

use nalgebra::DMatrix;

/// Cost sentinel for inadmissible pairs. Large enough to never beat an
/// admissible chain, small enough to keep the potentials finite.
pub const UNASSIGNABLE: f64 = 1e9;

/// Per-index tie-break perturbations. Totals are far below any
/// meaningful score difference; among equal-cost optima they prefer the
/// lower candidate index, then the lower reference index.
const COLUMN_EPSILON: f64 = 1e-9;
const ROW_EPSILON: f64 = 1e-12;

/// Solve the assignment over a rows×cols cost matrix.
///
/// Returns, for each row, the column it is matched to, or `None` when the
/// optimum leaves the row on an [`UNASSIGNABLE`] cell (no admissible
/// partner survives the competition).
pub fn solve(cost: &DMatrix<f64>) -> Vec<Option<usize>> {
    let rows = cost.nrows();
    let cols = cost.ncols();
    if rows == 0 || cols == 0 {
        return vec![None; rows];
    }

    let perturbed = DMatrix::from_fn(rows, cols, |i, j| {
        cost[(i, j)] + (j + 1) as f64 * COLUMN_EPSILON + (i + 1) as f64 * ROW_EPSILON
    });

    let assignment = if rows <= cols {
        hungarian(&perturbed)
    } else {
        // The potentials formulation wants rows <= cols; transpose and
        // invert the mapping.
        let transposed = perturbed.transpose();
        let col_to_row = hungarian(&transposed);
        let mut row_to_col = vec![usize::MAX; rows];
        for (col, row) in col_to_row.into_iter().enumerate() {
            if row != usize::MAX {
                row_to_col[row] = col;
            }
        }
        row_to_col
    };

    assignment
        .into_iter()
        .enumerate()
        .map(|(row, col)| {
            if col == usize::MAX || cost[(row, col)] >= UNASSIGNABLE {
                None
            } else {
                Some(col)
            }
        })
        .collect()
}

/// Hungarian algorithm with row/column potentials. Requires
/// `cost.nrows() <= cost.ncols()`; returns the matched column per row.
fn hungarian(cost: &DMatrix<f64>) -> Vec<usize> {
    let n = cost.nrows();
    let m = cost.ncols();
    debug_assert!(n <= m);

    // 1-indexed working arrays; index 0 is the virtual unmatched column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut matched_row = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        matched_row[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = matched_row[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = cost[(i0 - 1, j - 1)] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }

        // Walk the augmenting path back to the root.
        loop {
            let j1 = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut result = vec![usize::MAX; n];
    for j in 1..=m {
        if matched_row[j] != 0 {
            result[matched_row[j] - 1] = j - 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(rows, cols, values)
    }

    #[test]
    fn empty_inputs_produce_no_matches() {
        assert!(solve(&DMatrix::<f64>::zeros(0, 3)).is_empty());
        assert_eq!(solve(&DMatrix::<f64>::zeros(2, 0)), vec![None, None]);
    }

    #[test]
    fn identity_costs_match_diagonally() {
        let big = UNASSIGNABLE;
        #[rustfmt::skip]
        let cost = matrix(3, 3, &[
            0.0, big, big,
            big, 0.0, big,
            big, big, 0.0,
        ]);
        assert_eq!(solve(&cost), vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn optimum_beats_greedy() {
        // Greedy takes (r0, c0) at cost 1 and strands r1 on cost 10;
        // the optimum pays 2 + 3 instead.
        #[rustfmt::skip]
        let cost = matrix(2, 2, &[
            1.0, 2.0,
            3.0, 10.0,
        ]);
        assert_eq!(solve(&cost), vec![Some(1), Some(0)]);
    }

    #[test]
    fn competition_gives_the_candidate_to_the_better_reference() {
        // One admissible column; row 0 scores better and wins it.
        #[rustfmt::skip]
        let cost = matrix(2, 1, &[
            1.0,
            2.0,
        ]);
        assert_eq!(solve(&cost), vec![Some(0), None]);
    }

    #[test]
    fn unassignable_rows_stay_unmatched() {
        let big = UNASSIGNABLE;
        #[rustfmt::skip]
        let cost = matrix(3, 3, &[
            0.5, big, big,
            big, big, big,
            big, big, 0.25,
        ]);
        assert_eq!(solve(&cost), vec![Some(0), None, Some(2)]);
    }

    #[test]
    fn wide_matrix_leaves_extra_columns_unused() {
        #[rustfmt::skip]
        let cost = matrix(2, 4, &[
            5.0, 1.0, 9.0, 9.0,
            2.0, 6.0, 9.0, 9.0,
        ]);
        assert_eq!(solve(&cost), vec![Some(1), Some(0)]);
    }

    #[test]
    fn tall_matrix_leaves_extra_rows_unmatched() {
        #[rustfmt::skip]
        let cost = matrix(3, 1, &[
            4.0,
            1.0,
            2.0,
        ]);
        assert_eq!(solve(&cost), vec![None, Some(0), None]);
    }

    #[test]
    fn ties_prefer_the_lower_candidate_index() {
        // Both columns cost the same; the epsilon nudges row 0 to column 0.
        #[rustfmt::skip]
        let cost = matrix(1, 2, &[
            3.0, 3.0,
        ]);
        assert_eq!(solve(&cost), vec![Some(0)]);
    }

    #[test]
    fn equal_total_optima_resolve_deterministically() {
        // Two optimal assignments with equal total cost; repeated solves
        // must agree.
        #[rustfmt::skip]
        let cost = matrix(2, 2, &[
            1.0, 1.0,
            1.0, 1.0,
        ]);
        let first = solve(&cost);
        for _ in 0..10 {
            assert_eq!(solve(&cost), first);
        }
        assert_eq!(first, vec![Some(0), Some(1)]);
    }

    #[test]
    fn larger_random_like_instance_is_stable() {
        // Fixed pseudo-random costs; the solver must return the same
        // matching every time and keep it one-to-one.
        let mut state = 0x1234_5678_9abc_def0u64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 1000) as f64 / 10.0
        };
        let cost = DMatrix::from_fn(8, 11, |_, _| next());
        let first = solve(&cost);
        assert_eq!(solve(&cost), first);
        let mut seen = std::collections::HashSet::new();
        for col in first.iter().flatten() {
            assert!(seen.insert(*col), "column assigned twice");
        }
        assert_eq!(first.iter().filter(|c| c.is_some()).count(), 8);
    }
}
