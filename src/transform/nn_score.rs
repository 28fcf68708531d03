//! Event categorisation with a two-fold network.
//!
//! Each fold was trained on one half of the events and is applied to the
//! other half: the fold-0 model scores odd event numbers and the fold-1 model
//! scores even ones.

use tracing::info;

use super::{EventTransform, OutputColumn, OutputRecord, DEFAULT_FLOAT};
use crate::error::{Error, KernelError, Result};
use crate::network::Inference;
use crate::table::{ColumnId, ColumnType, Row, RowSource};

/// The two fold models of a classifier.
pub struct FoldModels {
    fold0: Box<dyn Inference>,
    fold1: Box<dyn Inference>,
}

impl FoldModels {
    /// Both folds must agree on inputs and output labels.
    pub fn new(fold0: Box<dyn Inference>, fold1: Box<dyn Inference>) -> Result<Self> {
        if fold0.input_names() != fold1.input_names() {
            return Err(Error::Config("fold models declare different inputs".into()));
        }
        if fold0.output_labels() != fold1.output_labels() {
            return Err(Error::Config("fold models declare different outputs".into()));
        }
        Ok(Self { fold0, fold1 })
    }

    /// Model applied to `event`.
    pub fn for_event(&self, event: u64) -> &dyn Inference {
        if event % 2 == 1 {
            self.fold0.as_ref()
        } else {
            self.fold1.as_ref()
        }
    }

    pub fn input_names(&self) -> &[String] {
        self.fold0.input_names()
    }

    pub fn output_labels(&self) -> &[String] {
        self.fold0.output_labels()
    }
}

pub struct NnCategoryScorer {
    models: FoldModels,
    inputs: Vec<ColumnId>,
    event: ColumnId,
    columns: Vec<OutputColumn>,
}

impl NnCategoryScorer {
    pub fn bind(source: &mut RowSource, channel: &str, models: FoldModels) -> Result<Self> {
        let mut inputs = Vec::with_capacity(models.input_names().len());
        for name in models.input_names() {
            let ty = source.column_type(name)?;
            if !matches!(ty, ColumnType::F32 | ColumnType::I32) {
                return Err(Error::Config(format!(
                    "network input '{name}' has type {}, only f32 and i32 are supported",
                    ty.as_str()
                )));
            }
            inputs.push(source.bind(name, ty)?);
        }
        let event = source.bind("event", ColumnType::U64)?;
        let mut columns: Vec<OutputColumn> = models
            .output_labels()
            .iter()
            .map(|label| OutputColumn::float(format!("{channel}_{label}")))
            .collect();
        columns.push(OutputColumn::float(format!("{channel}_max_score")));
        columns.push(OutputColumn::float_with_default(format!("{channel}_max_index"), 0.0));
        info!(
            channel,
            inputs = inputs.len(),
            classes = models.output_labels().len(),
            "configured fold classifier"
        );
        Ok(Self {
            models,
            inputs,
            event,
            columns,
        })
    }
}

impl EventTransform for NnCategoryScorer {
    fn name(&self) -> &'static str {
        "nn_score"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        let values: Vec<f64> = self.inputs.iter().map(|&id| row.f64(id)).collect();
        let model = self.models.for_event(row.u64(self.event));
        let scores = model.evaluate_labelled(&values)?;
        let mut max_score = DEFAULT_FLOAT;
        let mut max_index = 0.0f32;
        for (i, score) in scores.into_iter().enumerate() {
            let score = score as f32;
            record.set_f32(i, score);
            if score > max_score {
                max_score = score;
                max_index = i as f32;
            }
        }
        let n = self.columns.len();
        record.set_f32(n - 2, max_score);
        record.set_f32(n - 1, max_index);
        Ok(())
    }
}
