//! Row-range driver: evaluates a transform over `[first, last]` and feeds the
//! sink in source order.

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::EntryRange;
use crate::error::{Error, Result};
use crate::table::{FriendSink, RowSource, Scalar};
use crate::transform::{EventTransform, OutputColumn, OutputRecord};

/// Extra column recording rows whose kernel failed, declared only when
/// failures are isolated.
pub const ROW_FAILED_COLUMN: &str = "row_failed";

/// Rows handed to the worker pool per batch.
const CHUNK_SIZE: u64 = 4096;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// `1` runs the sequential loop.
    pub threads: usize,
    /// Turn a kernel error into a default row flagged in [`ROW_FAILED_COLUMN`]
    /// instead of aborting the run.
    pub isolate_failures: bool,
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            isolate_failures: false,
            progress: false,
        }
    }
}

/// Counters of a finished run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: u64,
    /// Rows outside the transform's domain, written with defaults.
    pub gated: u64,
    /// Rows with a recovered numeric degeneracy.
    pub degenerate: u64,
    /// Rows whose kernel failed (only with isolated failures).
    pub failed: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Outcome {
    Computed,
    Gated,
    Degenerate,
    Failed,
}

impl RunSummary {
    fn record(&mut self, outcome: Outcome) {
        self.rows += 1;
        match outcome {
            Outcome::Computed => {}
            Outcome::Gated => self.gated += 1,
            Outcome::Degenerate => self.degenerate += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

fn process_row(
    source: &RowSource,
    transform: &dyn EventTransform,
    entry: u64,
    isolate_failures: bool,
) -> Result<(OutputRecord, Outcome)> {
    let row = source.materialize(entry)?;
    let mut record = OutputRecord::defaults(transform.columns());
    let outcome = if !transform.gate(&row) {
        debug!(entry, "row outside transform domain");
        Outcome::Gated
    } else {
        match transform.compute(&row, &mut record) {
            Ok(()) if record.diagnostics().is_empty() => Outcome::Computed,
            Ok(()) => {
                for message in record.diagnostics() {
                    warn!(entry, transform = transform.name(), "{message}");
                }
                Outcome::Degenerate
            }
            Err(err) if isolate_failures => {
                warn!(entry, transform = transform.name(), error = %err, "kernel failed, writing defaults");
                record = OutputRecord::defaults(transform.columns());
                Outcome::Failed
            }
            Err(err) => return Err(Error::Kernel { entry, source: err }),
        }
    };
    if isolate_failures {
        record.push(Scalar::I32(i32::from(outcome == Outcome::Failed)));
    }
    Ok((record, outcome))
}

fn progress_bar(range: &EntryRange, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(range.len());
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40} {pos}/{len} rows [{elapsed_precise}<{eta_precise}]")
    {
        bar.set_style(style);
    }
    bar
}

/// Run `transform` over `range` and append one record per entry to `sink`.
///
/// The range is validated before the sink is touched. On success the sink
/// holds exactly `range.len()` rows, row `i` computed from entry
/// `range.first() + i`.
pub fn run(
    source: &RowSource,
    transform: &dyn EventTransform,
    range: EntryRange,
    sink: &mut FriendSink,
    options: &RunOptions,
) -> Result<RunSummary> {
    source.check_range(&range)?;
    let mut columns: Vec<OutputColumn> = transform.columns().to_vec();
    if options.isolate_failures {
        columns.push(OutputColumn::int(ROW_FAILED_COLUMN, 0));
    }
    sink.declare_columns(&columns)?;
    info!(
        transform = transform.name(),
        first = range.first(),
        last = range.last(),
        threads = options.threads,
        "processing entries"
    );

    let bar = progress_bar(&range, options.progress);
    let mut summary = RunSummary::default();
    if options.threads <= 1 {
        for entry in range.entries().progress_with(bar.clone()) {
            let (record, outcome) = process_row(source, transform, entry, options.isolate_failures)?;
            sink.append(&record)?;
            summary.record(outcome);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()?;
        let mut start = range.first();
        while start <= range.last() {
            let end = range.last().min(start.saturating_add(CHUNK_SIZE - 1));
            let chunk: Vec<Result<(OutputRecord, Outcome)>> = pool.install(|| {
                (0..(end - start + 1) as usize)
                    .into_par_iter()
                    .progress_with(bar.clone())
                    .map(|k| process_row(source, transform, start + k as u64, options.isolate_failures))
                    .collect()
            });
            for result in chunk {
                let (record, outcome) = result?;
                sink.append(&record)?;
                summary.record(outcome);
            }
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
    }
    bar.finish_and_clear();

    if sink.rows() != range.len() {
        return Err(Error::Sink(format!(
            "wrote {} rows for a range of {} entries",
            sink.rows(),
            range.len()
        )));
    }
    info!(
        rows = summary.rows,
        gated = summary.gated,
        degenerate = summary.degenerate,
        failed = summary.failed,
        "finished entries"
    );
    Ok(summary)
}
