//! Compressed sparse row matrices and a bounded top-N sparse product.
//!
//! The lexical matcher multiplies a `sources x ngrams` matrix by the transpose of a
//! `labels x ngrams` matrix. With tens of thousands of labels the full product is far too
//! large to materialise, so [`top_n_product`] keeps only the `ntop` best columns of each
//! output row while it is being computed (the "awesome cossim top-n" approach).
//!
//! References:
//! - Gustavson (1978): row-wise sparse matrix multiplication with a dense accumulator.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A sparse matrix in CSR layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build from per-row `(column, value)` entries. Zero values are dropped and columns
    /// are sorted within each row; duplicate columns are summed.
    ///
    /// Entries whose column is `>= n_cols` are ignored.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        let n_rows = rows.len();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for mut row in rows {
            row.retain(|&(c, v)| c < n_cols && v != 0.0);
            row.sort_unstable_by_key(|&(c, _)| c);
            let mut last: Option<usize> = None;
            for (c, v) in row {
                if last == Some(c) {
                    if let Some(slot) = data.last_mut() {
                        *slot += v;
                    }
                    continue;
                }
                indices.push(c);
                data.push(v);
                last = Some(c);
            }
            indptr.push(indices.len());
        }
        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    /// An `n_rows x n_cols` matrix with no stored entries.
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored entries of row `i` as `(column, value)` in storage order.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (start, end) = if i < self.n_rows {
            (self.indptr[i], self.indptr[i + 1])
        } else {
            (0, 0)
        };
        self.indices[start..end]
            .iter()
            .copied()
            .zip(self.data[start..end].iter().copied())
    }

    /// Value at `(i, j)`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.row(i)
            .find(|&(c, _)| c == j)
            .map(|(_, v)| v)
            .unwrap_or(0.0)
    }

    /// Transpose (CSR of the transposed matrix).
    pub fn transpose(&self) -> CsrMatrix {
        let mut counts = vec![0usize; self.n_cols + 1];
        for &c in &self.indices {
            counts[c + 1] += 1;
        }
        for k in 0..self.n_cols {
            counts[k + 1] += counts[k];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut data = vec![0.0f64; self.nnz()];
        for i in 0..self.n_rows {
            for (c, v) in self.row(i) {
                let slot = next[c];
                indices[slot] = i;
                data[slot] = v;
                next[c] += 1;
            }
        }
        CsrMatrix {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            indptr,
            indices,
            data,
        }
    }
}

#[derive(PartialEq)]
struct FloatOrd(f64);

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sparse product `a * b`, keeping per output row only the `ntop` largest entries that
/// are `>= lower_bound` (and strictly positive).
///
/// Rows of the result are stored in descending value order (ties: ascending column), so
/// [`CsrMatrix::row`] yields candidates best-first. A row with no qualifying entry is
/// simply empty; `lower_bound = 0.0` is valid.
///
/// # Panics
///
/// Never; mismatched inner dimensions contribute nothing for the out-of-range part.
pub fn top_n_product(a: &CsrMatrix, b: &CsrMatrix, ntop: usize, lower_bound: f64) -> CsrMatrix {
    let n_out = b.n_cols;
    if ntop == 0 {
        return CsrMatrix::zeros(a.n_rows, n_out);
    }

    // Dense accumulator plus a linked list of touched columns (Gustavson / SMMP).
    const UNSET: usize = usize::MAX;
    const HEAD_END: usize = usize::MAX - 1;
    let mut sums = vec![0.0f64; n_out];
    let mut next = vec![UNSET; n_out];

    let mut indptr = Vec::with_capacity(a.n_rows + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);

    for i in 0..a.n_rows {
        let mut head = HEAD_END;
        let mut touched = 0usize;
        for (k, a_ik) in a.row(i) {
            if k >= b.n_rows {
                continue;
            }
            for (j, b_kj) in b.row(k) {
                sums[j] += a_ik * b_kj;
                if next[j] == UNSET {
                    next[j] = head;
                    head = j;
                    touched += 1;
                }
            }
        }

        // Min-heap of the best `ntop` (value, Reverse(column)) pairs.
        let mut heap: BinaryHeap<Reverse<(FloatOrd, Reverse<usize>)>> =
            BinaryHeap::with_capacity(ntop.min(touched) + 1);
        for _ in 0..touched {
            let j = head;
            let v = sums[j];
            if v > 0.0 && v >= lower_bound && v.is_finite() {
                let item = Reverse((FloatOrd(v), Reverse(j)));
                if heap.len() < ntop {
                    heap.push(item);
                } else if let Some(min) = heap.peek() {
                    if item < *min {
                        heap.pop();
                        heap.push(item);
                    }
                }
            }
            head = next[j];
            next[j] = UNSET;
            sums[j] = 0.0;
        }

        let mut row: Vec<(usize, f64)> = heap
            .into_iter()
            .map(|Reverse((FloatOrd(v), Reverse(j)))| (j, v))
            .collect();
        // Deterministic: value desc, then column asc.
        row.sort_unstable_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
        for (j, v) in row {
            indices.push(j);
            data.push(v);
        }
        indptr.push(indices.len());
    }

    CsrMatrix {
        n_rows: a.n_rows,
        n_cols: n_out,
        indptr,
        indices,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_product(a: &CsrMatrix, b: &CsrMatrix) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; b.n_cols()]; a.n_rows()];
        for (i, row) in out.iter_mut().enumerate() {
            for (k, av) in a.row(i) {
                for (j, bv) in b.row(k) {
                    row[j] += av * bv;
                }
            }
        }
        out
    }

    fn sample() -> (CsrMatrix, CsrMatrix) {
        let a = CsrMatrix::from_rows(
            3,
            vec![
                vec![(0, 1.0), (2, 2.0)],
                vec![(1, 1.0)],
                vec![],
                vec![(0, 0.5), (1, 0.5), (2, 0.5)],
            ],
        );
        // b: 3 x 4
        let b = CsrMatrix::from_rows(
            4,
            vec![
                vec![(0, 1.0), (3, 0.2)],
                vec![(1, 3.0), (3, 0.1)],
                vec![(0, 0.5), (2, 1.0)],
            ],
        );
        (a, b)
    }

    #[test]
    fn from_rows_sums_duplicates_and_drops_zeros() {
        let m = CsrMatrix::from_rows(3, vec![vec![(2, 1.0), (0, 0.0), (2, 0.5), (9, 4.0)]]);
        assert_eq!(m.nnz(), 1);
        assert_eq!(m.get(0, 2), 1.5);
    }

    #[test]
    fn transpose_round_trips() {
        let (a, _) = sample();
        let t = a.transpose();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.n_cols(), 4);
        assert_eq!(t.get(2, 0), 2.0);
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn unbounded_top_n_equals_dense_product() {
        let (a, b) = sample();
        let dense = dense_product(&a, &b);
        let c = top_n_product(&a, &b, usize::MAX, 0.0);
        for (i, row) in dense.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                assert!((c.get(i, j) - v).abs() < 1e-12, "({i},{j})");
            }
        }
    }

    #[test]
    fn keeps_only_top_n_in_descending_order() {
        let (a, b) = sample();
        let c = top_n_product(&a, &b, 2, 0.0);
        let row0: Vec<(usize, f64)> = c.row(0).collect();
        // dense row 0 = [2.0, 0, 2.0, 0.2]; ties broken by column.
        assert_eq!(row0, vec![(0, 2.0), (2, 2.0)]);
        assert!(c.row(2).next().is_none());
    }

    #[test]
    fn lower_bound_filters_entries() {
        let (a, b) = sample();
        let c = top_n_product(&a, &b, 10, 0.5);
        assert!(c.row(0).all(|(_, v)| v >= 0.5));
        assert_eq!(c.row(0).count(), 2);
        let c = top_n_product(&a, &b, 10, 100.0);
        assert_eq!(c.nnz(), 0);
    }
}
