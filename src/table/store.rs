//! On-disk layout of table containers.
//!
//! A container (`sample.root`) is a directory, each partition is a
//! subdirectory, and each table is a Parquet file named after the tree:
//! `sample.root/mt_nominal/ntuple.parquet`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

const TABLE_FILE_EXTENSION: &str = "parquet";

/// Path of `tree` inside `partition` of `container`.
pub fn table_file(container: &Path, partition: &str, tree: &str) -> PathBuf {
    container
        .join(partition)
        .join(format!("{tree}.{TABLE_FILE_EXTENSION}"))
}

/// Resolve a table file, reporting which level of the layout is missing.
pub fn locate_table(container: &Path, partition: &str, tree: &str) -> Result<PathBuf> {
    if !container.is_dir() {
        return Err(Error::NotFound {
            what: "input file",
            path: container.to_path_buf(),
        });
    }
    let partition_dir = container.join(partition);
    if !partition_dir.is_dir() {
        return Err(Error::NotFound {
            what: "partition",
            path: partition_dir,
        });
    }
    let path = table_file(container, partition, tree);
    if !path.is_file() {
        return Err(Error::NotFound { what: "table", path });
    }
    Ok(path)
}

pub fn read_table(container: &Path, partition: &str, tree: &str) -> Result<DataFrame> {
    let path = locate_table(container, partition, tree)?;
    let file = File::open(&path)?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Row count from the Parquet footer, without decoding columns.
pub fn count_rows(container: &Path, partition: &str, tree: &str) -> Result<u64> {
    let path = locate_table(container, partition, tree)?;
    let file = File::open(&path)?;
    Ok(ParquetReader::new(file).num_rows()? as u64)
}

/// Partitions of a container, sorted by name.
pub fn list_partitions(container: &Path) -> Result<Vec<String>> {
    if !container.is_dir() {
        return Err(Error::NotFound {
            what: "input file",
            path: container.to_path_buf(),
        });
    }
    let mut partitions = Vec::new();
    for entry in fs::read_dir(container)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            partitions.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    partitions.sort();
    Ok(partitions)
}

/// Write `frame` as `tree` of `partition`, replacing any existing table.
///
/// The table is written to a temporary file next to its destination and
/// renamed into place, so readers never observe a partial table.
pub fn write_table(
    container: &Path,
    partition: &str,
    tree: &str,
    frame: &mut DataFrame,
) -> Result<PathBuf> {
    let dir = container.join(partition);
    fs::create_dir_all(&dir)?;
    let target = table_file(container, partition, tree);
    let mut tmp = NamedTempFile::new_in(&dir)?;
    ParquetWriter::new(&mut tmp).finish(frame)?;
    tmp.persist(&target).map_err(|err| Error::Io(err.error))?;
    Ok(target)
}
