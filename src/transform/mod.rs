//! Per-event transforms.
//!
//! Every variant declares its output columns (with their sentinel defaults)
//! up front, exposes a domain gate, and fills one [`OutputRecord`] per row. The
//! driver builds a fresh all-default record for each row and only calls
//! [`EventTransform::compute`] when the gate holds, so the loop is identical for
//! all variants.

pub mod mela;
pub mod nn_mass;
pub mod nn_recoil;
pub mod nn_score;
pub mod reweight;
pub mod svfit;

use crate::error::KernelError;
use crate::table::{ColumnType, Row, Scalar};

pub use mela::{Hypothesis, MatrixElement, MelaCandidate, MelaScorer};
pub use nn_mass::NnMassRegressor;
pub use nn_recoil::NnRecoilRegressor;
pub use nn_score::NnCategoryScorer;
pub use reweight::ZPtMassReweighter;
pub use svfit::{DiTauMassKernel, MetDefinition, SvFitReconstructor};

/// Out-of-domain sentinel for float outputs.
pub const DEFAULT_FLOAT: f32 = -10.0;

/// Declaration of one output column.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub ty: ColumnType,
    /// Value written when the row is gated out or not computed.
    pub default: Scalar,
}

impl OutputColumn {
    /// `f32` column with the standard sentinel.
    pub fn float(name: impl Into<String>) -> Self {
        Self::float_with_default(name, DEFAULT_FLOAT)
    }
    pub fn float_with_default(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::F32,
            default: Scalar::F32(default),
        }
    }
    pub fn int(name: impl Into<String>, default: i32) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::I32,
            default: Scalar::I32(default),
        }
    }
}

/// Output values of one row, aligned with the transform's columns.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRecord {
    values: Vec<Scalar>,
    diagnostics: Vec<String>,
}

impl OutputRecord {
    /// Record holding every column's default.
    pub fn defaults(columns: &[OutputColumn]) -> Self {
        Self {
            values: columns.iter().map(|column| column.default).collect(),
            diagnostics: Vec::new(),
        }
    }
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }
    pub fn get(&self, index: usize) -> Scalar {
        self.values[index]
    }
    pub fn set(&mut self, index: usize, value: Scalar) {
        self.values[index] = value;
    }
    pub fn set_f32(&mut self, index: usize, value: f32) {
        self.values[index] = Scalar::F32(value);
    }
    pub(crate) fn push(&mut self, value: Scalar) {
        self.values.push(value);
    }
    /// Note a recovered numeric degeneracy for this row.
    pub fn diagnose(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

/// A pluggable per-event computation.
pub trait EventTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fixed, ordered output columns.
    fn columns(&self) -> &[OutputColumn];

    /// Whether the kernel is valid for this row. Gated-out rows keep defaults.
    fn gate(&self, row: &Row) -> bool {
        let _ = row;
        true
    }

    /// Fill `record`, which arrives holding every column's default.
    fn compute(&self, row: &Row, record: &mut OutputRecord) -> Result<(), KernelError>;
}

/// Ratio `numerator / denominator`, or the sentinel with a diagnostic when the
/// denominator is exactly zero.
pub(crate) fn guarded_ratio(
    numerator: f64,
    denominator: f64,
    label: &str,
    record: &mut OutputRecord,
) -> f32 {
    if denominator == 0.0 {
        record.diagnose(format!("{label}: zero denominator"));
        return DEFAULT_FLOAT;
    }
    (numerator / denominator) as f32
}
