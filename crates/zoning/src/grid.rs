//! Full-resolution cluster label grid

use ndarray::Array2;
use std::collections::BTreeMap;

/// Per-pixel cluster assignments at the original raster resolution.
///
/// Cells outside the validity mask, and cells orphaned when their zone is
/// filtered out, carry `None`. Labeled cells carry a cluster id. Keeping the
/// unset state in the type avoids sentinel values leaking into arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    labels: Array2<Option<u32>>,
}

impl LabelGrid {
    /// Create a grid with every cell unlabeled
    pub fn unlabeled(rows: usize, cols: usize) -> Self {
        Self {
            labels: Array2::from_elem((rows, cols), None),
        }
    }

    pub fn rows(&self) -> usize {
        self.labels.nrows()
    }

    pub fn cols(&self) -> usize {
        self.labels.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.labels.dim()
    }

    /// Label at (row, col); `None` when unlabeled or out of bounds
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.labels.get((row, col)).copied().flatten()
    }

    /// Assign or clear the label at (row, col). Out-of-bounds writes are
    /// ignored.
    pub fn set(&mut self, row: usize, col: usize, label: Option<u32>) {
        if let Some(cell) = self.labels.get_mut((row, col)) {
            *cell = label;
        }
    }

    /// Iterate all cells with their coordinates in row-major order
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), Option<u32>)> + '_ {
        self.labels.indexed_iter().map(|(idx, label)| (idx, *label))
    }

    /// Number of cells carrying a label
    pub fn labeled_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_some()).count()
    }

    /// Coordinates of every cell carrying `label`, in row-major order
    pub fn pixels_of(&self, label: u32) -> Vec<(usize, usize)> {
        self.labels
            .indexed_iter()
            .filter_map(|(idx, cell)| (*cell == Some(label)).then_some(idx))
            .collect()
    }

    /// Cell counts per label, ordered by label
    pub fn label_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for label in self.labels.iter().flatten() {
            *counts.entry(*label).or_insert(0usize) += 1;
        }
        counts
    }

    /// Rewrite every label through `mapping`; labels absent from the mapping
    /// become unlabeled.
    ///
    /// Returns the rewritten grid and the number of cells whose label was
    /// dropped.
    pub fn relabel(&self, mapping: &BTreeMap<u32, u32>) -> (LabelGrid, usize) {
        let mut orphaned = 0usize;
        let labels = self.labels.mapv(|cell| match cell {
            Some(old) => match mapping.get(&old) {
                Some(new) => Some(*new),
                None => {
                    orphaned += 1;
                    None
                }
            },
            None => None,
        });
        (LabelGrid { labels }, orphaned)
    }
}
