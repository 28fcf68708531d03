//! Splitting inputs into batch jobs and merging their shards back together.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EntryRange;
use crate::error::{Error, Result};
use crate::naming;
use crate::table::store;

/// One batch job: a single partition and entry range of one input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub input: PathBuf,
    pub folder: String,
    pub tree: String,
    pub first_entry: u64,
    pub last_entry: u64,
    /// Full command line running this job.
    pub command: String,
}

/// Disjoint ranges of at most `events_per_job` entries covering `[0, entries)`.
pub fn plan_ranges(entries: u64, events_per_job: u64) -> Result<Vec<EntryRange>> {
    if events_per_job == 0 {
        return Err(Error::Config("events per job must be positive".into()));
    }
    let mut ranges = Vec::new();
    let mut first = 0;
    while first < entries {
        let last = (first + events_per_job).min(entries) - 1;
        ranges.push(EntryRange::new(first, last)?);
        first = last + 1;
    }
    Ok(ranges)
}

/// Jobs for every partition of every input, numbered from zero.
///
/// `extra_args` are appended verbatim to each job's command line.
pub fn plan_jobs(
    inputs: &[PathBuf],
    tree: &str,
    events_per_job: u64,
    variant: &str,
    extra_args: &[String],
) -> Result<BTreeMap<usize, Job>> {
    let executable = env!("CARGO_PKG_NAME");
    let mut jobs = BTreeMap::new();
    for input in inputs {
        for folder in store::list_partitions(input)? {
            if !store::table_file(input, &folder, tree).is_file() {
                warn!(input = %input.display(), folder, tree, "partition has no such table, skipping");
                continue;
            }
            let entries = store::count_rows(input, &folder, tree)?;
            for range in plan_ranges(entries, events_per_job)? {
                let mut command = format!(
                    "{executable} {variant} --input {} --folder {folder} --tree {tree} --first_entry {} --last_entry {}",
                    input.display(),
                    range.first(),
                    range.last()
                );
                for arg in extra_args {
                    command.push(' ');
                    command.push_str(arg);
                }
                jobs.insert(
                    jobs.len(),
                    Job {
                        input: input.clone(),
                        folder: folder.clone(),
                        tree: tree.to_string(),
                        first_entry: range.first(),
                        last_entry: range.last(),
                        command,
                    },
                );
            }
        }
    }
    info!(inputs = inputs.len(), jobs = jobs.len(), "planned jobs");
    Ok(jobs)
}

pub fn write_job_database(path: &Path, jobs: &BTreeMap<usize, Job>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(jobs)?)?;
    Ok(())
}

pub fn read_job_database(path: &Path) -> Result<BTreeMap<usize, Job>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Shards of `input`/`folder` found under `shard_directory`, sorted by range.
pub fn find_shards(input: &Path, folder: &str, shard_directory: &Path) -> Result<Vec<(EntryRange, PathBuf)>> {
    let input_name = naming::path_str(input);
    let base = naming::base_name(&input_name);
    let dir = shard_directory.join(base);
    if !dir.is_dir() {
        return Err(Error::NotFound {
            what: "shard directory",
            path: dir,
        });
    }
    let mut shards = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((first, last)) = naming::parse_shard_name(&name, base, folder) {
            shards.push((EntryRange::new(first, last)?, entry.path()));
        }
    }
    shards.sort_by_key(|(range, _)| range.first());
    Ok(shards)
}

/// Concatenate the shards of `input`/`folder` into `{base}/{base}.root` under
/// `shard_directory`, after checking that they tile the input's entries
/// exactly.
pub fn merge_shards(input: &Path, folder: &str, tree: &str, shard_directory: &Path) -> Result<(PathBuf, u64)> {
    let entries = store::count_rows(input, folder, tree)?;
    let shards = find_shards(input, folder, shard_directory)?;
    if shards.is_empty() {
        return Err(Error::NotFound {
            what: "shards",
            path: shard_directory.to_path_buf(),
        });
    }
    let mut expected = 0;
    for (range, path) in &shards {
        if range.first() != expected {
            return Err(Error::Config(format!(
                "shard {} starts at entry {}, expected {expected}",
                path.display(),
                range.first()
            )));
        }
        expected = range.last() + 1;
    }
    if expected != entries {
        return Err(Error::Config(format!(
            "shards cover {expected} entries, input has {entries}"
        )));
    }

    let mut merged: Option<DataFrame> = None;
    for (range, path) in &shards {
        let frame = store::read_table(path, folder, tree)?;
        if frame.height() as u64 != range.len() {
            return Err(Error::FriendMisaligned {
                path: path.clone(),
                expected: range.len(),
                found: frame.height() as u64,
            });
        }
        match merged.as_mut() {
            Some(all) => {
                all.vstack_mut(&frame)?;
            }
            None => merged = Some(frame),
        }
    }
    let Some(mut merged) = merged else {
        return Err(Error::Sink("no shard contents to merge".into()));
    };
    merged.align_chunks();
    let container = shard_directory.join(naming::merged_output_path(&naming::path_str(input)));
    let written = store::write_table(&container, folder, tree, &mut merged)?;
    info!(shards = shards.len(), rows = entries, output = %written.display(), "merged shards");
    Ok((container, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_tile_the_table() {
        let ranges = plan_ranges(25, 10).unwrap();
        let bounds: Vec<(u64, u64)> = ranges.iter().map(|r| (r.first(), r.last())).collect();
        assert_eq!(bounds, vec![(0, 9), (10, 19), (20, 24)]);
        assert!(plan_ranges(0, 10).unwrap().is_empty());
        assert_eq!(plan_ranges(10, 10).unwrap().len(), 1);
        assert!(plan_ranges(10, 0).is_err());
    }
}
