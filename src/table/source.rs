//! Indexed access to a partition's table, optionally extended by friend tables.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use super::{store, ColumnData, ColumnId, ColumnType, Row};
use crate::config::EntryRange;
use crate::error::{Error, Result};

struct BoundColumn {
    name: String,
    ty: ColumnType,
    data: ColumnData,
}

/// Read-only view of one table with columns bound by name.
pub struct RowSource {
    path: PathBuf,
    partition: String,
    tree: String,
    frame: DataFrame,
    bound: Vec<BoundColumn>,
}

impl RowSource {
    /// Open `tree` inside `partition` of the container at `path`.
    pub fn open(path: &Path, partition: &str, tree: &str) -> Result<Self> {
        let frame = store::read_table(path, partition, tree)?;
        info!(
            input = %path.display(),
            partition,
            tree,
            rows = frame.height(),
            "opened input table"
        );
        Ok(Self::from_frame(path, partition, tree, frame))
    }

    /// Wrap an already loaded table.
    pub fn from_frame(path: &Path, partition: &str, tree: &str, frame: DataFrame) -> Self {
        Self {
            path: path.to_path_buf(),
            partition: partition.to_string(),
            tree: tree.to_string(),
            frame,
            bound: Vec::new(),
        }
    }

    /// Join a friend table by row position.
    ///
    /// Columns already present in the source shadow same-named friend columns.
    pub fn attach_friend(&mut self, partition: &str, tree: &str, friend: &Path) -> Result<()> {
        let friend_frame = store::read_table(friend, partition, tree)?;
        self.attach_friend_frame(friend, friend_frame)
    }

    pub(crate) fn attach_friend_frame(&mut self, friend: &Path, frame: DataFrame) -> Result<()> {
        let expected = self.len();
        let found = frame.height() as u64;
        if found != expected {
            return Err(Error::FriendMisaligned {
                path: friend.to_path_buf(),
                expected,
                found,
            });
        }
        let existing: Vec<String> = self
            .frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut added = Vec::new();
        for series in frame.get_columns() {
            if existing.iter().any(|name| name == series.name()) {
                debug!(column = series.name(), friend = %friend.display(), "shadowed friend column");
                continue;
            }
            added.push(series.clone());
        }
        info!(friend = %friend.display(), columns = added.len(), "attached friend table");
        self.frame.hstack_mut(&added)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn partition(&self) -> &str {
        &self.partition
    }
    pub fn tree(&self) -> &str {
        &self.tree
    }

    /// Number of rows in the (joined) table.
    pub fn len(&self) -> u64 {
        self.frame.height() as u64
    }
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Stored type of a column.
    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        let series = self
            .frame
            .column(name)
            .map_err(|_| Error::schema(name, "no such column"))?;
        ColumnType::from_dtype(series.dtype()).ok_or_else(|| {
            Error::schema(name, format!("unsupported column type {}", series.dtype()))
        })
    }

    /// Bind a column so that it is materialized into every [`Row`].
    pub fn bind(&mut self, name: &str, ty: ColumnType) -> Result<ColumnId> {
        if let Some(index) = self.bound.iter().position(|column| column.name == name) {
            let bound = &self.bound[index];
            if bound.ty != ty {
                return Err(Error::schema(
                    name,
                    format!("already bound as {}, requested {}", bound.ty.as_str(), ty.as_str()),
                ));
            }
            return Ok(ColumnId(index));
        }
        let stored = self.column_type(name)?;
        if stored != ty {
            return Err(Error::schema(
                name,
                format!("stored as {}, requested {}", stored.as_str(), ty.as_str()),
            ));
        }
        let data = ColumnData::from_series(self.frame.column(name)?, ty)?;
        self.bound.push(BoundColumn {
            name: name.to_string(),
            ty,
            data,
        });
        Ok(ColumnId(self.bound.len() - 1))
    }

    /// Name of a bound column.
    pub fn bound_name(&self, id: ColumnId) -> &str {
        &self.bound[id.0].name
    }

    /// Fail unless every entry of `range` exists.
    pub fn check_range(&self, range: &EntryRange) -> Result<()> {
        if range.last() >= self.len() {
            return Err(Error::OutOfRange {
                index: range.last(),
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Load the bound columns of entry `index`.
    pub fn materialize(&self, index: u64) -> Result<Row> {
        if index >= self.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.len(),
            });
        }
        let i = index as usize;
        let values = self
            .bound
            .iter()
            .map(|column| column.data.get(i))
            .collect();
        Ok(Row::new(index, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Scalar;

    fn source() -> RowSource {
        let frame = DataFrame::new(vec![
            Series::new("pt_1", vec![30.0f32, 40.0, 50.0]),
            Series::new("njets", vec![0i32, 2, 3]),
            Series::new("event", vec![11u64, 12, 13]),
        ])
        .unwrap();
        RowSource::from_frame(Path::new("sample.root"), "mt_nominal", "ntuple", frame)
    }

    #[test]
    fn binds_and_materializes_typed_rows() {
        let mut source = source();
        let pt = source.bind("pt_1", ColumnType::F32).unwrap();
        let event = source.bind("event", ColumnType::U64).unwrap();
        let row = source.materialize(1).unwrap();
        assert_eq!(row.entry(), 1);
        assert_eq!(row.f32(pt), 40.0);
        assert_eq!(row.get(event), Scalar::U64(12));
    }

    #[test]
    fn rebinding_returns_same_id() {
        let mut source = source();
        let a = source.bind("pt_1", ColumnType::F32).unwrap();
        let b = source.bind("pt_1", ColumnType::F32).unwrap();
        assert_eq!(a, b);
        assert_eq!(source.bound_name(a), "pt_1");
    }

    #[test]
    fn schema_mismatches_are_reported() {
        let mut source = source();
        assert!(matches!(
            source.bind("missing", ColumnType::F32),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            source.bind("njets", ColumnType::F32),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn out_of_range_is_an_error_not_a_fault() {
        let source = source();
        assert!(matches!(
            source.materialize(3),
            Err(Error::OutOfRange { index: 3, len: 3 })
        ));
        assert!(source.check_range(&EntryRange::new(0, 2).unwrap()).is_ok());
        assert!(source.check_range(&EntryRange::new(1, 3).unwrap()).is_err());
    }

    #[test]
    fn friends_extend_columns_by_position() {
        let mut source = source();
        let friend = DataFrame::new(vec![
            Series::new("m_sv", vec![91.0f32, 125.0, 300.0]),
            Series::new("pt_1", vec![-1.0f32, -1.0, -1.0]),
        ])
        .unwrap();
        source
            .attach_friend_frame(Path::new("friend.root"), friend)
            .unwrap();
        let m_sv = source.bind("m_sv", ColumnType::F32).unwrap();
        let pt = source.bind("pt_1", ColumnType::F32).unwrap();
        let row = source.materialize(2).unwrap();
        assert_eq!(row.f32(m_sv), 300.0);
        assert_eq!(row.f32(pt), 50.0);
    }

    #[test]
    fn misaligned_friend_is_rejected() {
        let mut source = source();
        let friend = DataFrame::new(vec![Series::new("m_sv", vec![1.0f32])]).unwrap();
        let err = source
            .attach_friend_frame(Path::new("friend.root"), friend)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FriendMisaligned {
                expected: 3,
                found: 1,
                ..
            }
        ));
    }
}
