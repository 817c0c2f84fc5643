//! Fixed-size batching of projected tuples.

use super::projector::ProjectedTuple;

/// Tuples submitted together as one insert statement.
#[derive(Clone, Debug)]
pub struct Batch {
    /// 1-based position in submission order.
    pub sequence: usize,
    pub rows: Vec<ProjectedTuple>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Buffers tuples until `batch_size` is reached.
///
/// Every offered tuple ends up in exactly one emitted batch, in offer order.
pub struct BatchAccumulator {
    batch_size: usize,
    current: Vec<ProjectedTuple>,
    emitted: usize,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            current: Vec::with_capacity(batch_size),
            emitted: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of tuples waiting in the open batch.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Append a tuple; returns the filled batch once it reaches the size bound.
    pub fn offer(&mut self, tuple: ProjectedTuple) -> Option<Batch> {
        self.current.push(tuple);
        if self.current.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Hand over the remainder at end of stream, if any.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Batch {
        self.emitted += 1;
        let rows = std::mem::replace(&mut self.current, Vec::with_capacity(self.batch_size));
        Batch {
            sequence: self.emitted,
            rows,
        }
    }
}
