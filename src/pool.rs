//! Thread-local scratch buffers for the edit-distance engine.
//!
//! Every thread keeps one [`EditScratch`] that is reset, not reallocated,
//! between measurements. A measurement borrows the scratch for its whole
//! duration, so no buffer is ever shared by two concurrent calls.

use std::cell::RefCell;

/// Number of printable ASCII characters (`0x20..=0x7E`).
pub const ALPHABET: usize = 0x7F - 0x20;

thread_local! {
    static EDIT_SCRATCH: RefCell<EditScratch> = RefCell::new(EditScratch::default());
}

/// Reusable buffers for one edit-distance measurement.
#[derive(Debug, Default)]
pub struct EditScratch {
    /// Last row at which each printable character occurred.
    pub(crate) last_row: Vec<usize>,
    /// Distance matrix of `(rows + 1) * (cols + 1)` cells, row-major.
    pub(crate) matrix: Vec<usize>,
    pub(crate) cols: usize,
    /// Filtered, case-folded inputs.
    pub(crate) left: Vec<u8>,
    pub(crate) right: Vec<u8>,
}

impl EditScratch {
    /// Size the matrix for `rows x cols`, zero it and seed its borders.
    ///
    /// The first row and column hold their index. The opposite border holds
    /// `rows + cols`, a value no real path can exceed.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.last_row.clear();
        self.last_row.resize(ALPHABET, 0);

        let len = (rows + 1) * (cols + 1);
        self.matrix.clear();
        self.matrix.resize(len, 0);
        self.cols = cols;

        let unreachable = rows + cols;
        for i in 1..=rows {
            self.set(i, 0, i);
            self.set(i, cols, unreachable);
        }
        for j in 1..=cols {
            self.set(0, j, j);
            self.set(rows, j, unreachable);
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> usize {
        self.matrix[row * (self.cols + 1) + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: usize) {
        let cols = self.cols;
        self.matrix[row * (cols + 1) + col] = value;
    }

    /// Allocated matrix capacity, in cells.
    pub fn capacity(&self) -> usize {
        self.matrix.capacity()
    }
}

/// Execute `f` with this thread's scratch buffers.
///
/// A nested call on the same thread gets a fresh, temporary scratch instead
/// of the pooled one.
pub fn with_edit_scratch<F, R>(f: F) -> R
where
    F: FnOnce(&mut EditScratch) -> R,
{
    EDIT_SCRATCH.with(|cell| match cell.try_borrow_mut() {
        Ok(mut scratch) => f(&mut scratch),
        Err(_) => f(&mut EditScratch::default()),
    })
}
