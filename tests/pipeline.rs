//! End-to-end friend-tree production on on-disk containers.

use std::fs;
use std::path::{Path, PathBuf};

use friend_trees::jobs;
use friend_trees::prelude::*;
use friend_trees::table::store;
use friend_trees::transform::reweight::{DEFAULT_MASS_THRESHOLD, WEIGHT_COLUMN};
use polars::prelude::{DataFrame, NamedFrom, Series};

const FOLDER: &str = "mt_nominal";
const TREE: &str = "ntuple";

const MASSES: [f32; 10] = [30.0, 49.9, 50.0, 75.0, 120.0, 150.0, 199.0, 500.0, 80.0, 60.0];
const PTS: [f32; 10] = [10.0, 10.0, 10.0, 150.0, 50.0, 500.0, 5000.0, 50.0, -5.0, 50.0];
const WEIGHTS: [f32; 10] = [1.0, 1.0, 1.25, 1.5, 0.75, 0.5, 0.5, 0.75, 1.25, 1.25];

fn table() -> Histogram2D {
    Histogram2D::new(
        vec![50.0, 100.0, 200.0],
        vec![0.0, 100.0, 1000.0],
        vec![vec![1.25, 1.5], vec![0.75, 0.5]],
    )
    .unwrap()
}

fn write_input(dir: &Path, columns: Vec<Series>) -> PathBuf {
    let input = dir.join("DYJets").join("DYJets.root");
    let mut frame = DataFrame::new(columns).unwrap();
    store::write_table(&input, FOLDER, TREE, &mut frame).unwrap();
    input
}

fn boson_input(dir: &Path, masses: &[f32], pts: &[f32]) -> PathBuf {
    write_input(
        dir,
        vec![
            Series::new("genbosonmass", masses.to_vec()),
            Series::new("genbosonpt", pts.to_vec()),
        ],
    )
}

fn config(input: &Path, output_directory: &Path, first: u64, last: u64) -> RunConfig {
    let mut config = RunConfig::new(input, FOLDER, EntryRange::new(first, last).unwrap());
    config.output_directory = output_directory.to_path_buf();
    config
}

fn reweight(config: &RunConfig, table: Histogram2D) -> Result<(PathBuf, RunSummary)> {
    pipeline::produce(config, |source| {
        let transform = ZPtMassReweighter::bind(source, table, DEFAULT_MASS_THRESHOLD)?;
        Ok(Box::new(transform) as Box<dyn EventTransform>)
    })
}

/// Load the table, then run, in the order the command line does.
fn reweight_with_table_from(config: &RunConfig, weight_directory: &Path) -> Result<(PathBuf, RunSummary)> {
    let table = loader::load_reweight_table(weight_directory, 2017)?;
    reweight(config, table)
}

fn score_with_models_from(config: &RunConfig, model_directory: &Path) -> Result<(PathBuf, RunSummary)> {
    let channel = config.channel().to_string();
    let models = loader::load_fold_models(model_directory, 2017, &channel)?;
    pipeline::produce(config, |source| {
        let transform = NnCategoryScorer::bind(source, &channel, models)?;
        Ok(Box::new(transform) as Box<dyn EventTransform>)
    })
}

fn weights(container: &Path) -> Vec<f32> {
    store::read_table(container, FOLDER, TREE)
        .unwrap()
        .column(WEIGHT_COLUMN)
        .unwrap()
        .f32()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn reweighting_writes_one_weight_per_entry() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let out = dir.path().join("out");
    let config = config(&input, &out, 0, 9);

    let (table_file, summary) = reweight(&config, table()).unwrap();
    assert_eq!(summary.rows, 10);
    assert_eq!(summary.gated, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(table_file, store::table_file(&config.output_path(), FOLDER, TREE));
    assert_eq!(config.output_path(), out.join("DYJets/DYJets_mt_nominal_0_9.root"));
    assert_eq!(weights(&config.output_path()), WEIGHTS.to_vec());
}

#[test]
fn sub_range_rows_follow_the_first_entry() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let config = config(&input, dir.path(), 3, 6);
    reweight(&config, table()).unwrap();
    assert_eq!(weights(&config.output_path()), WEIGHTS[3..=6].to_vec());
}

#[test]
fn rerunning_reproduces_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let config = config(&input, dir.path(), 0, 9);
    reweight(&config, table()).unwrap();
    let first = store::read_table(&config.output_path(), FOLDER, TREE).unwrap();
    reweight(&config, table()).unwrap();
    let second = store::read_table(&config.output_path(), FOLDER, TREE).unwrap();
    assert!(first.equals(&second));
}

#[test]
fn threaded_run_matches_sequential_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let sequential = config(&input, &dir.path().join("seq"), 0, 9);
    let mut threaded = config(&input, &dir.path().join("par"), 0, 9);
    threaded.threads = 4;
    reweight(&sequential, table()).unwrap();
    reweight(&threaded, table()).unwrap();
    assert_eq!(weights(&sequential.output_path()), weights(&threaded.output_path()));
}

#[test]
fn friend_columns_are_joined_by_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), vec![Series::new("genbosonmass", MASSES.to_vec())]);
    let friend = dir.path().join("friend.root");
    let mut friend_frame = DataFrame::new(vec![Series::new("genbosonpt", PTS.to_vec())]).unwrap();
    store::write_table(&friend, FOLDER, TREE, &mut friend_frame).unwrap();

    let mut config = config(&input, dir.path(), 0, 9);
    config.input_friends = vec![friend];
    reweight(&config, table()).unwrap();
    assert_eq!(weights(&config.output_path()), WEIGHTS.to_vec());
}

#[test]
fn misaligned_friend_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), vec![Series::new("genbosonmass", MASSES.to_vec())]);
    let friend = dir.path().join("friend.root");
    let mut friend_frame = DataFrame::new(vec![Series::new("genbosonpt", vec![1.0f32; 4])]).unwrap();
    store::write_table(&friend, FOLDER, TREE, &mut friend_frame).unwrap();

    let mut config = config(&input, dir.path(), 0, 3);
    config.input_friends = vec![friend];
    let err = reweight(&config, table()).unwrap_err();
    assert!(matches!(err, Error::FriendMisaligned { expected: 10, found: 4, .. }));
    assert!(!config.output_path().exists());
}

#[test]
fn missing_table_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let config = config(&input, dir.path(), 0, 9);
    let err = reweight_with_table_from(&config, &dir.path().join("weights")).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.exit_code(), 11);
    assert!(!config.output_path().exists());

    // the same run succeeds once the table is in place
    fs::create_dir_all(dir.path().join("weights")).unwrap();
    fs::write(
        loader::reweight_table_path(&dir.path().join("weights"), 2017),
        r#"{"x_edges": [50, 100, 200], "y_edges": [0, 100, 1000],
            "contents": [[1.25, 1.5], [0.75, 0.5]]}"#,
    )
    .unwrap();
    reweight_with_table_from(&config, &dir.path().join("weights")).unwrap();
    assert_eq!(weights(&config.output_path()), WEIGHTS.to_vec());
}

#[test]
fn missing_input_column_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), vec![Series::new("genbosonmass", MASSES.to_vec())]);
    let config = config(&input, dir.path(), 0, 9);
    let err = reweight(&config, table()).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { ref column, .. } if column == "genbosonpt"));
    assert!(!config.output_path().exists());
}

#[test]
fn missing_model_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        vec![
            Series::new("pt_1", vec![30.0f32; 10]),
            Series::new("event", (0..10u64).collect::<Vec<_>>()),
        ],
    );
    let config = config(&input, dir.path(), 0, 9);
    let err = score_with_models_from(&config, &dir.path().join("models")).unwrap_err();
    assert!(matches!(err, Error::NotFound { what: "network model", .. }));
    assert!(!config.output_path().exists());
}

#[test]
fn out_of_range_request_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let config = config(&input, dir.path(), 5, 10);
    let err = reweight(&config, table()).unwrap_err();
    assert!(matches!(err, Error::OutOfRange { index: 10, len: 10 }));
    assert!(!config.output_path().exists());
}

#[test]
fn isolated_failures_add_a_flag_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let mut config = config(&input, dir.path(), 0, 9);
    config.isolate_failures = true;
    let (_, summary) = reweight(&config, table()).unwrap();
    assert_eq!(summary.failed, 0);
    let frame = store::read_table(&config.output_path(), FOLDER, TREE).unwrap();
    let flags: Vec<i32> = frame
        .column(friend_trees::driver::ROW_FAILED_COLUMN)
        .unwrap()
        .i32()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(flags, vec![0; 10]);
}

#[test]
fn planned_shards_merge_into_the_full_range() {
    let dir = tempfile::tempdir().unwrap();
    let masses: Vec<f32> = (0..25).map(|i| 40.0 + 7.0 * i as f32).collect();
    let pts: Vec<f32> = (0..25).map(|i| 45.0 * i as f32).collect();
    let input = boson_input(dir.path(), &masses, &pts);
    // a partition without the tree is skipped
    fs::create_dir_all(input.join("et_nominal")).unwrap();

    let planned = jobs::plan_jobs(&[input.clone()], TREE, 10, "reweight", &[]).unwrap();
    assert_eq!(planned.len(), 3);
    let database = dir.path().join("jobs.json");
    jobs::write_job_database(&database, &planned).unwrap();
    let planned = jobs::read_job_database(&database).unwrap();
    assert!(planned[&0].command.contains("--first_entry 0 --last_entry 9"));

    let shards = dir.path().join("shards");
    for job in planned.values() {
        assert_eq!(job.folder, FOLDER);
        reweight(&config(&job.input, &shards, job.first_entry, job.last_entry), table()).unwrap();
    }
    let (merged, rows) = jobs::merge_shards(&input, FOLDER, TREE, &shards).unwrap();
    assert_eq!(rows, 25);
    assert_eq!(merged, shards.join("DYJets/DYJets.root"));

    let full = config(&input, &dir.path().join("full"), 0, 24);
    reweight(&full, table()).unwrap();
    assert_eq!(weights(&merged), weights(&full.output_path()));
}

#[test]
fn merge_rejects_a_gap_between_shards() {
    let dir = tempfile::tempdir().unwrap();
    let input = boson_input(dir.path(), &MASSES, &PTS);
    let shards = dir.path().join("shards");
    reweight(&config(&input, &shards, 0, 3), table()).unwrap();
    reweight(&config(&input, &shards, 5, 9), table()).unwrap();
    let err = jobs::merge_shards(&input, FOLDER, TREE, &shards).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
