//! Z boson (mass, pT) reweighting.

use super::{EventTransform, OutputColumn, OutputRecord};
use crate::error::{KernelError, Result};
use crate::histogram::Histogram2D;
use crate::table::{ColumnId, ColumnType, Row, RowSource};

pub const WEIGHT_COLUMN: &str = "zPtMassWeightKIT";
/// Generator-level boson mass below which no reweighting is applied.
pub const DEFAULT_MASS_THRESHOLD: f64 = 50.0;

pub struct ZPtMassReweighter {
    mass: ColumnId,
    pt: ColumnId,
    table: Histogram2D,
    threshold: f64,
    columns: Vec<OutputColumn>,
}

impl ZPtMassReweighter {
    pub fn bind(source: &mut RowSource, table: Histogram2D, threshold: f64) -> Result<Self> {
        table.validate()?;
        Ok(Self {
            mass: source.bind("genbosonmass", ColumnType::F32)?,
            pt: source.bind("genbosonpt", ColumnType::F32)?,
            table,
            threshold,
            columns: vec![OutputColumn::float_with_default(WEIGHT_COLUMN, 1.0)],
        })
    }
}

impl EventTransform for ZPtMassReweighter {
    fn name(&self) -> &'static str {
        "reweight"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn gate(&self, row: &Row) -> bool {
        row.f64(self.mass) >= self.threshold
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        let weight = self.table.lookup_clamped(row.f64(self.mass), row.f64(self.pt));
        record.set_f32(0, weight as f32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Scalar;
    use polars::prelude::*;
    use std::path::Path;

    fn table() -> Histogram2D {
        Histogram2D::new(
            vec![50.0, 100.0, 200.0],
            vec![0.0, 100.0, 1000.0],
            vec![vec![1.25, 1.5], vec![0.75, 0.5]],
        )
        .unwrap()
    }

    fn weights(masses: Vec<f32>, pts: Vec<f32>) -> Vec<Scalar> {
        let frame = DataFrame::new(vec![
            Series::new("genbosonmass", masses),
            Series::new("genbosonpt", pts),
        ])
        .unwrap();
        let mut source = RowSource::from_frame(Path::new("dy.root"), "mt_nominal", "ntuple", frame);
        let transform = ZPtMassReweighter::bind(&mut source, table(), DEFAULT_MASS_THRESHOLD).unwrap();
        (0..source.len())
            .map(|i| {
                let row = source.materialize(i).unwrap();
                let mut record = OutputRecord::defaults(transform.columns());
                if transform.gate(&row) {
                    transform.compute(&row, &mut record).unwrap();
                }
                record.get(0)
            })
            .collect()
    }

    #[test]
    fn below_threshold_is_neutral() {
        let w = weights(vec![30.0, 49.9, 0.0], vec![10.0, 10.0, 10.0]);
        assert!(w.iter().all(|v| *v == Scalar::F32(1.0)));
    }

    #[test]
    fn lookup_and_clamping() {
        let w = weights(vec![60.0, 150.0, 500.0, 200.0], vec![10.0, 500.0, 10.0, 5000.0]);
        assert_eq!(w, vec![Scalar::F32(1.25), Scalar::F32(0.5), Scalar::F32(0.75), Scalar::F32(0.5)]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let w = weights(vec![50.0], vec![10.0]);
        assert_eq!(w, vec![Scalar::F32(1.25)]);
    }
}
