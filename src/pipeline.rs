//! One friend-tree production run, from configuration to persisted output.

use std::path::PathBuf;

use tracing::info;

use crate::config::RunConfig;
use crate::driver::{self, RunOptions, RunSummary};
use crate::error::Result;
use crate::table::{FriendSink, RowSource};
use crate::transform::EventTransform;

/// Open the input, build the transform with `build`, process the configured
/// range and persist the friend table.
///
/// Every startup step (inputs, friends, models, range) completes before the
/// output is created, so a failing startup leaves no output table behind.
pub fn produce<F>(config: &RunConfig, build: F) -> Result<(PathBuf, RunSummary)>
where
    F: FnOnce(&mut RowSource) -> Result<Box<dyn EventTransform>>,
{
    let mut source = RowSource::open(&config.input, &config.folder, &config.tree)?;
    for friend in &config.input_friends {
        source.attach_friend(&config.folder, &config.tree, friend)?;
    }
    let transform = build(&mut source)?;
    source.check_range(&config.range)?;

    let destination = config.output_path();
    let mut sink = FriendSink::create(&destination, &config.folder, &config.tree)?;
    let options = RunOptions {
        threads: config.threads,
        isolate_failures: config.isolate_failures,
        progress: config.progress,
    };
    let summary = driver::run(&source, transform.as_ref(), config.range, &mut sink, &options)?;
    let written = sink.finalize()?;
    info!(
        transform = transform.name(),
        output = %destination.display(),
        rows = summary.rows,
        "friend tree produced"
    );
    Ok((written, summary))
}
