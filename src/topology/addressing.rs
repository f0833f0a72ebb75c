//! Derived LDU addressing: face orderings and per-cell face ranges.
//!
//! Internal faces are stored in owner order by construction. Forward sweeps of
//! the incomplete-factorisation preconditioners need them in *neighbour*
//! order instead ("losort"), and row-wise smoothers need each cell's faces.

/// Cached face orderings derived from owner/neighbour addressing.
#[derive(Clone, Debug)]
pub struct LduAddressing {
    /// Internal faces sorted by neighbour cell (stable in face index).
    losort: Vec<usize>,
    /// Internal faces sorted by owner cell (stable in face index).
    owner_sort: Vec<usize>,
    /// `owner_start[c]..owner_start[c+1]` indexes `owner_sort` for faces owned by `c`.
    owner_start: Vec<usize>,
    /// `losort_start[c]..losort_start[c+1]` indexes `losort` for faces whose neighbour is `c`.
    losort_start: Vec<usize>,
}

fn counting_sort(n_cells: usize, keys: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut start = vec![0usize; n_cells + 1];
    for &k in keys {
        start[k + 1] += 1;
    }
    for c in 0..n_cells {
        start[c + 1] += start[c];
    }
    let mut cursor = start.clone();
    let mut order = vec![0usize; keys.len()];
    for (face, &k) in keys.iter().enumerate() {
        order[cursor[k]] = face;
        cursor[k] += 1;
    }
    (order, start)
}

impl LduAddressing {
    pub fn new(n_cells: usize, lower: &[usize], upper: &[usize]) -> Self {
        let (owner_sort, owner_start) = counting_sort(n_cells, lower);
        let (losort, losort_start) = counting_sort(n_cells, upper);
        Self {
            losort,
            owner_sort,
            owner_start,
            losort_start,
        }
    }

    pub fn losort(&self) -> &[usize] {
        &self.losort
    }

    pub fn owner_sort(&self) -> &[usize] {
        &self.owner_sort
    }

    /// Internal faces owned by `cell`.
    pub fn owned_faces(&self, cell: usize) -> &[usize] {
        &self.owner_sort[self.owner_start[cell]..self.owner_start[cell + 1]]
    }

    /// Internal faces whose neighbour is `cell`.
    pub fn neighbour_faces(&self, cell: usize) -> &[usize] {
        &self.losort[self.losort_start[cell]..self.losort_start[cell + 1]]
    }
}
