//! Output friend table, written row by row in source order.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use super::{store, ColumnData};
use crate::error::{Error, Result};
use crate::transform::{OutputColumn, OutputRecord};

/// Destination of one run's transform outputs.
pub struct FriendSink {
    path: PathBuf,
    partition: String,
    tree: String,
    columns: Option<Vec<OutputColumn>>,
    buffers: Vec<ColumnData>,
    rows: u64,
}

impl FriendSink {
    /// Prepare `tree` inside `partition` of the container at `path`. Nothing
    /// is written until [`FriendSink::finalize`].
    pub fn create(path: &Path, partition: &str, tree: &str) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            partition: partition.to_string(),
            tree: tree.to_string(),
            columns: None,
            buffers: Vec::new(),
            rows: 0,
        })
    }

    /// Declare the output columns. Must happen exactly once, before any append.
    pub fn declare_columns(&mut self, columns: &[OutputColumn]) -> Result<()> {
        if self.columns.is_some() {
            return Err(Error::Sink("columns already declared".into()));
        }
        if columns.is_empty() {
            return Err(Error::Sink("no output columns declared".into()));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name == column.name) {
                return Err(Error::Sink(format!("duplicate output column '{}'", column.name)));
            }
        }
        self.buffers = columns
            .iter()
            .map(|column| ColumnData::with_capacity(column.ty, 0))
            .collect();
        self.columns = Some(columns.to_vec());
        Ok(())
    }

    pub fn append(&mut self, record: &OutputRecord) -> Result<()> {
        let columns = self
            .columns
            .as_ref()
            .ok_or_else(|| Error::Sink("append before declare_columns".into()))?;
        if record.values().len() != columns.len() {
            return Err(Error::Sink(format!(
                "record has {} values, {} columns declared",
                record.values().len(),
                columns.len()
            )));
        }
        if let Some((column, value)) = columns
            .iter()
            .zip(record.values())
            .find(|(column, value)| value.column_type() != column.ty)
        {
            return Err(Error::Sink(format!(
                "column '{}' expects {}, got {}",
                column.name,
                column.ty.as_str(),
                value.column_type().as_str()
            )));
        }
        for (buffer, value) in self.buffers.iter_mut().zip(record.values()) {
            buffer.push(*value);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Persist the table, replacing an existing one, and return its file path.
    pub fn finalize(self) -> Result<PathBuf> {
        let columns = self
            .columns
            .ok_or_else(|| Error::Sink("finalize before declare_columns".into()))?;
        let series: Vec<Series> = self
            .buffers
            .into_iter()
            .zip(&columns)
            .map(|(buffer, column)| buffer.into_series(&column.name))
            .collect();
        let mut frame = DataFrame::new(series)?;
        let written = store::write_table(&self.path, &self.partition, &self.tree, &mut frame)?;
        info!(output = %written.display(), rows = self.rows, "wrote friend table");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Scalar;

    fn columns() -> Vec<OutputColumn> {
        vec![OutputColumn::float("m_nn"), OutputColumn::int("row_failed", 0)]
    }

    #[test]
    fn append_requires_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FriendSink::create(&dir.path().join("out.root"), "mt_nominal", "ntuple").unwrap();
        let record = OutputRecord::defaults(&columns());
        assert!(matches!(sink.append(&record), Err(Error::Sink(_))));
        sink.declare_columns(&columns()).unwrap();
        assert!(matches!(sink.declare_columns(&columns()), Err(Error::Sink(_))));
        sink.append(&record).unwrap();
        assert_eq!(sink.rows(), 1);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FriendSink::create(&dir.path().join("out.root"), "mt_nominal", "ntuple").unwrap();
        sink.declare_columns(&columns()).unwrap();
        let mut record = OutputRecord::defaults(&columns());
        record.set(1, Scalar::F32(1.0));
        assert!(matches!(sink.append(&record), Err(Error::Sink(_))));
    }

    #[test]
    fn finalize_writes_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("out.root");
        let mut sink = FriendSink::create(&container, "mt_nominal", "ntuple").unwrap();
        sink.declare_columns(&columns()).unwrap();
        for value in [1.0f32, 2.0, 3.0] {
            let mut record = OutputRecord::defaults(&columns());
            record.set_f32(0, value);
            sink.append(&record).unwrap();
        }
        assert!(!container.exists());
        sink.finalize().unwrap();
        let frame = store::read_table(&container, "mt_nominal", "ntuple").unwrap();
        let m_nn: Vec<f32> = frame
            .column("m_nn")
            .unwrap()
            .f32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(m_nn, vec![1.0, 2.0, 3.0]);
        assert_eq!(frame.column("row_failed").unwrap().dtype(), &DataType::Int32);
    }

    #[test]
    fn dropped_sink_leaves_no_container() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("out.root");
        let mut sink = FriendSink::create(&container, "mt_nominal", "ntuple").unwrap();
        sink.declare_columns(&columns()).unwrap();
        sink.append(&OutputRecord::defaults(&columns())).unwrap();
        drop(sink);
        assert!(!container.exists());
    }
}
