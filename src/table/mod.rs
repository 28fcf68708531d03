//! Columnar tables: scalar values, typed rows, row sources and output sinks.

pub mod sink;
pub mod source;
pub mod store;

use polars::prelude::*;

use crate::error::{Error, Result};

pub use sink::FriendSink;
pub use source::RowSource;

/// Scalar column types supported in friend-tree tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    F32,
    F64,
    I32,
    I64,
    U64,
}

impl ColumnType {
    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Float32 => Some(ColumnType::F32),
            DataType::Float64 => Some(ColumnType::F64),
            DataType::Int32 => Some(ColumnType::I32),
            DataType::Int64 => Some(ColumnType::I64),
            DataType::UInt64 => Some(ColumnType::U64),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::F32 => "f32",
            ColumnType::F64 => "f64",
            ColumnType::I32 => "i32",
            ColumnType::I64 => "i64",
            ColumnType::U64 => "u64",
        }
    }
}

/// A single typed value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
    U64(u64),
}

impl Scalar {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Scalar::F32(_) => ColumnType::F32,
            Scalar::F64(_) => ColumnType::F64,
            Scalar::I32(_) => ColumnType::I32,
            Scalar::I64(_) => ColumnType::I64,
            Scalar::U64(_) => ColumnType::U64,
        }
    }
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
            Scalar::I32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::U64(v) => v as f64,
        }
    }
}

/// Handle to a column bound on a [`RowSource`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnId(pub(crate) usize);

/// One materialized entry of a source table, returned by value.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    entry: u64,
    values: Vec<Scalar>,
}

impl Row {
    pub(crate) fn new(entry: u64, values: Vec<Scalar>) -> Self {
        Self { entry, values }
    }
    /// Zero-based index of this row in the source table.
    pub fn entry(&self) -> u64 {
        self.entry
    }
    pub fn get(&self, id: ColumnId) -> Scalar {
        self.values[id.0]
    }
    pub fn f32(&self, id: ColumnId) -> f32 {
        match self.get(id) {
            Scalar::F32(v) => v,
            other => other.as_f64() as f32,
        }
    }
    pub fn f64(&self, id: ColumnId) -> f64 {
        self.get(id).as_f64()
    }
    pub fn i32(&self, id: ColumnId) -> i32 {
        match self.get(id) {
            Scalar::I32(v) => v,
            Scalar::I64(v) => v as i32,
            Scalar::U64(v) => v as i32,
            other => other.as_f64() as i32,
        }
    }
    pub fn u64(&self, id: ColumnId) -> u64 {
        match self.get(id) {
            Scalar::U64(v) => v,
            Scalar::I32(v) => v as u64,
            Scalar::I64(v) => v as u64,
            other => other.as_f64() as u64,
        }
    }
}

/// Contiguous values of one column.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ColumnData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

impl ColumnData {
    pub(crate) fn with_capacity(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::F32 => ColumnData::F32(Vec::with_capacity(capacity)),
            ColumnType::F64 => ColumnData::F64(Vec::with_capacity(capacity)),
            ColumnType::I32 => ColumnData::I32(Vec::with_capacity(capacity)),
            ColumnType::I64 => ColumnData::I64(Vec::with_capacity(capacity)),
            ColumnType::U64 => ColumnData::U64(Vec::with_capacity(capacity)),
        }
    }

    /// Copy a polars column out, rejecting nulls.
    pub(crate) fn from_series(series: &Series, ty: ColumnType) -> Result<Self> {
        if series.null_count() > 0 {
            return Err(Error::schema(series.name(), "column contains null values"));
        }
        Ok(match ty {
            ColumnType::F32 => ColumnData::F32(series.f32()?.into_no_null_iter().collect()),
            ColumnType::F64 => ColumnData::F64(series.f64()?.into_no_null_iter().collect()),
            ColumnType::I32 => ColumnData::I32(series.i32()?.into_no_null_iter().collect()),
            ColumnType::I64 => ColumnData::I64(series.i64()?.into_no_null_iter().collect()),
            ColumnType::U64 => ColumnData::U64(series.u64()?.into_no_null_iter().collect()),
        })
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::I32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::U64(v) => v.len(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Scalar {
        match self {
            ColumnData::F32(v) => Scalar::F32(v[index]),
            ColumnData::F64(v) => Scalar::F64(v[index]),
            ColumnData::I32(v) => Scalar::I32(v[index]),
            ColumnData::I64(v) => Scalar::I64(v[index]),
            ColumnData::U64(v) => Scalar::U64(v[index]),
        }
    }

    /// Append a value; `false` when its type does not match the column.
    pub(crate) fn push(&mut self, value: Scalar) -> bool {
        match (self, value) {
            (ColumnData::F32(v), Scalar::F32(x)) => v.push(x),
            (ColumnData::F64(v), Scalar::F64(x)) => v.push(x),
            (ColumnData::I32(v), Scalar::I32(x)) => v.push(x),
            (ColumnData::I64(v), Scalar::I64(x)) => v.push(x),
            (ColumnData::U64(v), Scalar::U64(x)) => v.push(x),
            _ => return false,
        }
        true
    }

    pub(crate) fn into_series(self, name: &str) -> Series {
        match self {
            ColumnData::F32(v) => Series::new(name, v),
            ColumnData::F64(v) => Series::new(name, v),
            ColumnData::I32(v) => Series::new(name, v),
            ColumnData::I64(v) => Series::new(name, v),
            ColumnData::U64(v) => Series::new(name, v),
        }
    }
}
