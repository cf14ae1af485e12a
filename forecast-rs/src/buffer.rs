//! Fixed-capacity FIFO buffers for crystals and their derived histories.
//!
//! Every history the engine keeps is bounded by the window size; pushing into a
//! full buffer evicts the oldest entry.

use std::collections::VecDeque;

/// A wavelet crystal: scaling block followed by detail bands, coarsest first.
pub type Crystal = Vec<f64>;

/// A rolling buffer with fixed capacity.
///
/// Entries are kept oldest to newest; `push` on a full buffer drops the oldest.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a new rolling buffer with the specified capacity.
    ///
    /// # Example
    /// ```
    /// use wavecast::RollingBuffer;
    /// let mut buffer: RollingBuffer<f64> = RollingBuffer::new(2);
    /// buffer.push(1.0);
    /// buffer.push(2.0);
    /// buffer.push(3.0);
    /// assert_eq!(buffer.to_vec(), vec![2.0, 3.0]);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `value`, returning the evicted oldest entry when at capacity.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(value);
        evicted
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the buffer is at capacity.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    /// Get the buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Entry at `index`, counting from the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.buffer.get(index)
    }

    /// Entry `steps` positions back from the slot after the newest.
    ///
    /// `back(1)` is the newest entry; `back(len)` the oldest; `back(0)` is `None`.
    pub fn back(&self, steps: usize) -> Option<&T> {
        if steps == 0 || steps > self.buffer.len() {
            return None;
        }
        self.buffer.get(self.buffer.len() - steps)
    }

    /// Most recently pushed entry.
    pub fn newest(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }
}

impl<T: Clone> RollingBuffer<T> {
    /// Copy all entries out, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }
}

/// Matrix of past crystals, one row per transformed window.
///
/// Row `i` is the crystal of the window that started `len - 1 - i` samples
/// before the newest one, so the theorem's back-steps index rows directly.
#[derive(Debug, Clone)]
pub struct History {
    rows: RollingBuffer<Crystal>,
    width: usize,
}

impl History {
    /// Create a history of `capacity` rows of `width` coefficients.
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            rows: RollingBuffer::new(capacity),
            width,
        }
    }

    /// Append a crystal, evicting the oldest row when full.
    pub fn push(&mut self, crystal: Crystal) -> Option<Crystal> {
        debug_assert_eq!(crystal.len(), self.width);
        self.rows.push(crystal)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no row has been pushed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if the history holds `capacity` rows.
    pub fn is_full(&self) -> bool {
        self.rows.is_full()
    }

    /// Get the row capacity.
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Coefficients per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row by absolute index, oldest first.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Row `steps` back from the crystal about to be produced (`back(1)` is the newest).
    pub fn back(&self, steps: usize) -> Option<&[f64]> {
        self.rows.back(steps).map(Vec::as_slice)
    }

    /// Most recent crystal.
    pub fn newest(&self) -> Option<&[f64]> {
        self.rows.newest().map(Vec::as_slice)
    }

    /// Iterate rows oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Crystal> {
        self.rows.iter()
    }

    /// Drop every row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
