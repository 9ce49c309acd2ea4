//! Sink contract between the algorithm core and the observable writer.
//!
//! The core only needs to append scalars and correlation rows; everything
//! else (paths, naming, directories) belongs to the storage layer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;

/// Append-only observable sink. Scalars land one per line; correlation rows
/// land as `step<TAB>separation<TAB>value`. Opening the underlying resource
/// is the implementor's job and must fail fast.
pub trait ObservableSink {
    fn append_scalar(&mut self, value: f64) -> Result<()>;
    fn append_int(&mut self, value: i64) -> Result<()>;
    fn append_row(&mut self, step: usize, separation: usize, value: f64) -> Result<()>;
}

/// Sink that keeps everything in memory. Used by tests and by callers that
/// want to inspect a diagnostic series without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub scalars: Vec<f64>,
    pub ints: Vec<i64>,
    pub rows: Vec<(usize, usize, f64)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObservableSink for MemorySink {
    fn append_scalar(&mut self, value: f64) -> Result<()> {
        self.scalars.push(value);
        Ok(())
    }

    fn append_int(&mut self, value: i64) -> Result<()> {
        self.ints.push(value);
        Ok(())
    }

    fn append_row(&mut self, step: usize, separation: usize, value: f64) -> Result<()> {
        self.rows.push((step, separation, value));
        Ok(())
    }
}

/// Cloneable handle to a [`MemorySink`]. An update rule takes the boxed
/// handle while the caller keeps a second one to inspect what was flushed.
#[derive(Debug, Clone, Default)]
pub struct SharedSink(pub Rc<RefCell<MemorySink>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObservableSink for SharedSink {
    fn append_scalar(&mut self, value: f64) -> Result<()> {
        self.0.borrow_mut().append_scalar(value)
    }

    fn append_int(&mut self, value: i64) -> Result<()> {
        self.0.borrow_mut().append_int(value)
    }

    fn append_row(&mut self, step: usize, separation: usize, value: f64) -> Result<()> {
        self.0.borrow_mut().append_row(step, separation, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        sink.append_scalar(1.5).unwrap();
        sink.append_int(7).unwrap();
        sink.append_row(3, 0, 0.25).unwrap();

        assert_eq!(sink.scalars, vec![1.5]);
        assert_eq!(sink.ints, vec![7]);
        assert_eq!(sink.rows, vec![(3, 0, 0.25)]);
    }

    #[test]
    fn test_shared_sink_views_same_storage() {
        let handle = SharedSink::new();
        let mut writer = handle.clone();
        writer.append_scalar(0.5).unwrap();
        writer.append_scalar(0.75).unwrap();

        assert_eq!(handle.0.borrow().scalars, vec![0.5, 0.75]);
    }
}
