//! Run configuration, built once from the command line.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::naming;

/// Closed, zero-based interval of entries `[first, last]`.
///
/// Only [`EntryRange::new`] builds one, so `first <= last` always holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntryRange {
    first: u64,
    last: u64,
}

impl EntryRange {
    pub fn new(first: u64, last: u64) -> Result<Self> {
        if first > last {
            return Err(Error::InvalidRange { first, last });
        }
        Ok(Self { first, last })
    }
    pub fn first(&self) -> u64 {
        self.first
    }
    pub fn last(&self) -> u64 {
        self.last
    }
    /// Number of entries covered, both ends inclusive.
    pub fn len(&self) -> u64 {
        (self.last - self.first).saturating_add(1)
    }
    pub fn is_empty(&self) -> bool {
        false
    }
    pub fn entries(&self) -> std::ops::RangeInclusive<u64> {
        self.first..=self.last
    }
}

/// Static configuration of a single friend-tree production run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub input: PathBuf,
    pub input_friends: Vec<PathBuf>,
    pub folder: String,
    pub tree: String,
    pub range: EntryRange,
    pub output_directory: PathBuf,
    /// `1` runs the sequential loop.
    pub threads: usize,
    pub isolate_failures: bool,
    pub progress: bool,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, folder: &str, range: EntryRange) -> Self {
        Self {
            input: input.into(),
            input_friends: Vec::new(),
            folder: folder.to_string(),
            tree: "ntuple".to_string(),
            range,
            output_directory: PathBuf::from("."),
            threads: 1,
            isolate_failures: false,
            progress: false,
        }
    }

    pub fn channel(&self) -> &str {
        naming::channel_of(&self.folder)
    }

    /// Nickname of the input dataset, required for the year lookup.
    pub fn nickname(&self) -> Result<String> {
        let input = naming::path_str(&self.input);
        naming::nickname_of(&input)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot derive a dataset nickname from input path '{input}'"
                ))
            })
    }

    /// Destination container of this run's output.
    pub fn output_path(&self) -> PathBuf {
        let input = naming::path_str(&self.input);
        self.output_directory.join(naming::output_path(
            &input,
            &self.folder,
            self.range.first(),
            self.range.last(),
        ))
    }
}
