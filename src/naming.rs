//! Deterministic naming of friend-tree outputs.
//!
//! Downstream merge tooling locates shards purely by file name, so the layout
//! `{base}/{base}_{partition}_{first}_{last}.root` is fixed: no zero padding, no
//! additional separators.

use std::path::Path;

/// Extension of table containers, kept in output names for compatibility.
pub const TABLE_EXTENSION: &str = ".root";

/// Physics channel encoded as the first `_`-delimited token of a partition name.
pub fn channel_of(partition: &str) -> &str {
    partition.split('_').next().unwrap_or(partition)
}

/// Last path segment of `input` with the table extension stripped.
pub fn base_name(input: &str) -> &str {
    let file_name = input.rsplit('/').next().unwrap_or(input);
    file_name.strip_suffix(TABLE_EXTENSION).unwrap_or(file_name)
}

/// Dataset nickname, i.e. the directory holding the input file.
pub fn nickname_of(input: &str) -> Option<&str> {
    let mut segments = input.rsplit('/');
    segments.next()?;
    segments.next().filter(|nick| !nick.is_empty())
}

/// Relative output path of one shard of friend-tree output.
pub fn output_path(input: &str, partition: &str, first_entry: u64, last_entry: u64) -> String {
    let base = base_name(input);
    format!("{base}/{base}_{partition}_{first_entry}_{last_entry}{TABLE_EXTENSION}")
}

/// Relative path of the merged friend table for `input`.
pub fn merged_output_path(input: &str) -> String {
    let base = base_name(input);
    format!("{base}/{base}{TABLE_EXTENSION}")
}

/// Recover the entry range from a shard file name produced by [`output_path`].
pub fn parse_shard_name(file_name: &str, base: &str, partition: &str) -> Option<(u64, u64)> {
    let rest = file_name
        .strip_suffix(TABLE_EXTENSION)?
        .strip_prefix(base)?
        .strip_prefix('_')?
        .strip_prefix(partition)?
        .strip_prefix('_')?;
    let (first, last) = rest.split_once('_')?;
    Some((first.parse().ok()?, last.parse().ok()?))
}

/// Lossy string form of a path for the naming helpers.
pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
