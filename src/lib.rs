//! Friend-tree production for di-tau analyses.
//!
//! For a closed range of entries in one partition of an input table, a
//! pluggable [`EventTransform`] computes derived per-event quantities (network
//! scores and regressions, di-tau masses, matrix-element discriminants,
//! reweighting factors) and the results are written as a "friend" table whose
//! row `i` belongs to entry `first_entry + i` of the input.
//!
//! ```no_run
//! use friend_trees::prelude::*;
//!
//! # fn main() -> friend_trees::Result<()> {
//! let config = RunConfig::new("ntuples/DYJets/DYJets.root", "mt_nominal", EntryRange::new(0, 9)?);
//! let table = loader::load_reweight_table("weights".as_ref(), 2017)?;
//! let (output, summary) = pipeline::produce(&config, |source| {
//!     let reweighter = ZPtMassReweighter::bind(source, table, 50.0)?;
//!     Ok(Box::new(reweighter) as Box<dyn EventTransform>)
//! })?;
//! println!("{} rows written to {}", summary.rows, output.display());
//! # Ok(())
//! # }
//! ```
//!
//! Tables are stored as directories: `sample.root/<partition>/<tree>.parquet`.

pub mod config;
pub mod driver;
pub mod error;
pub mod histogram;
pub mod jobs;
pub mod kinematics;
pub mod likelihood;
pub mod loader;
pub mod naming;
pub mod network;
pub mod pipeline;
pub mod table;
pub mod transform;

pub use error::{Error, KernelError, Result};
pub use transform::{EventTransform, OutputColumn, OutputRecord, DEFAULT_FLOAT};

pub mod prelude {
    pub use crate::config::{EntryRange, RunConfig};
    pub use crate::driver::{RunOptions, RunSummary};
    pub use crate::error::{Error, KernelError, Result};
    pub use crate::histogram::Histogram2D;
    pub use crate::likelihood::LikelihoodScan;
    pub use crate::loader;
    pub use crate::network::{DenseNetwork, Inference};
    pub use crate::pipeline;
    pub use crate::table::{ColumnType, FriendSink, Row, RowSource, Scalar};
    pub use crate::transform::nn_score::FoldModels;
    pub use crate::transform::{
        EventTransform, MelaScorer, MetDefinition, NnCategoryScorer, NnMassRegressor,
        NnRecoilRegressor, OutputColumn, OutputRecord, SvFitReconstructor, ZPtMassReweighter,
        DEFAULT_FLOAT,
    };
}
