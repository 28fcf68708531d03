use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::{error, info};

use friend_trees::driver::RunSummary;
use friend_trees::jobs;
use friend_trees::prelude::*;
use friend_trees::transform::reweight::DEFAULT_MASS_THRESHOLD;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags shared by every friend-tree producer.
#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = "output.root")]
    input: PathBuf,
    #[arg(long = "input_friends", alias = "input-friends", num_args = 1..)]
    input_friends: Vec<PathBuf>,
    #[arg(long, default_value = "mt_nominal")]
    folder: String,
    #[arg(long, default_value = "ntuple")]
    tree: String,
    #[arg(long = "first_entry", alias = "first-entry", default_value_t = 0)]
    first_entry: u64,
    #[arg(long = "last_entry", alias = "last-entry", default_value_t = 9)]
    last_entry: u64,
    #[arg(long = "output_directory", alias = "output-directory", default_value = ".")]
    output_directory: PathBuf,
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Write defaults and flag `row_failed` instead of aborting on a kernel error.
    #[arg(long = "isolate_failures", alias = "isolate-failures")]
    isolate_failures: bool,
    #[arg(long = "no_progress", alias = "no-progress")]
    no_progress: bool,
}

impl RunArgs {
    fn config(&self) -> Result<RunConfig> {
        if self.threads == 0 {
            return Err(Error::Config("--threads must be at least 1".into()));
        }
        let range = EntryRange::new(self.first_entry, self.last_entry)?;
        let mut config = RunConfig::new(&self.input, &self.folder, range);
        config.input_friends = self.input_friends.clone();
        config.tree = self.tree.clone();
        config.output_directory = self.output_directory.clone();
        config.threads = self.threads;
        config.isolate_failures = self.isolate_failures;
        config.progress = !self.no_progress;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Z boson (mass, pT) weights from a per-year lookup table.
    Reweight {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        datasets: PathBuf,
        #[arg(long = "weight_directory", alias = "weight-directory")]
        weight_directory: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MASS_THRESHOLD)]
        threshold: f64,
    },
    /// Di-tau kinematics regressed by a network.
    NnMass {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long = "lwtnn_config", alias = "lwtnn-config", default_value = "model.json")]
        lwtnn_config: PathBuf,
    },
    /// Category scores from the two-fold classifier of the channel and year.
    NnScore {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long = "lwtnn_config", alias = "lwtnn-config")]
        lwtnn_config: PathBuf,
        #[arg(long)]
        datasets: PathBuf,
    },
    /// Hadronic recoil regressed from several MET definitions.
    NnRecoil {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long = "lwtnn_config", alias = "lwtnn-config")]
        lwtnn_config: PathBuf,
    },
    /// Di-tau mass from the likelihood scan.
    Svfit {
        #[command(flatten)]
        run: RunArgs,
        /// Also reconstruct with the PUPPI MET.
        #[arg(long = "with_puppi", alias = "with-puppi")]
        with_puppi: bool,
    },
    /// Split inputs into per-range jobs and write a job database.
    Plan {
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long = "events_per_job", alias = "events-per-job")]
        events_per_job: u64,
        #[arg(long, value_parser = ["reweight", "nn-mass", "nn-score", "nn-recoil", "svfit"])]
        variant: String,
        #[arg(long, default_value = "ntuple")]
        tree: String,
        #[arg(short, long, default_value = "jobs.json")]
        output: PathBuf,
        /// Arguments appended to every job command, after `--`.
        #[arg(last = true)]
        extra: Vec<String>,
    },
    /// Merge the shards of one input partition into a single friend table.
    Merge {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "mt_nominal")]
        folder: String,
        #[arg(long, default_value = "ntuple")]
        tree: String,
        #[arg(long = "shard_directory", alias = "shard-directory", default_value = ".")]
        shard_directory: PathBuf,
    },
}

fn report((output, summary): (PathBuf, RunSummary)) {
    info!(
        output = %output.display(),
        rows = summary.rows,
        gated = summary.gated,
        degenerate = summary.degenerate,
        failed = summary.failed,
        "done"
    );
}

fn execute(command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Reweight {
            run,
            datasets,
            weight_directory,
            threshold,
        }) => {
            let config = run.config()?;
            let year = loader::load_dataset_year(&datasets, &config.nickname()?)?;
            let table = loader::load_reweight_table(&weight_directory, year)?;
            report(pipeline::produce(&config, |source| {
                let transform = ZPtMassReweighter::bind(source, table, threshold)?;
                Ok(Box::new(transform) as Box<dyn EventTransform>)
            })?);
        }
        Some(Commands::NnMass { run, lwtnn_config }) => {
            let config = run.config()?;
            let network = loader::load_network_file(&lwtnn_config)?;
            report(pipeline::produce(&config, |source| {
                let transform = NnMassRegressor::bind(source, Box::new(network))?;
                Ok(Box::new(transform) as Box<dyn EventTransform>)
            })?);
        }
        Some(Commands::NnScore {
            run,
            lwtnn_config,
            datasets,
        }) => {
            let config = run.config()?;
            let channel = config.channel().to_string();
            let year = loader::load_dataset_year(&datasets, &config.nickname()?)?;
            let models = loader::load_fold_models(&lwtnn_config, year, &channel)?;
            report(pipeline::produce(&config, |source| {
                let transform = NnCategoryScorer::bind(source, &channel, models)?;
                Ok(Box::new(transform) as Box<dyn EventTransform>)
            })?);
        }
        Some(Commands::NnRecoil { run, lwtnn_config }) => {
            let config = run.config()?;
            let channel = config.channel().to_string();
            let network = loader::load_recoil_model(&lwtnn_config)?;
            report(pipeline::produce(&config, |source| {
                let transform = NnRecoilRegressor::bind(source, &channel, Box::new(network))?;
                Ok(Box::new(transform) as Box<dyn EventTransform>)
            })?);
        }
        Some(Commands::Svfit { run, with_puppi }) => {
            let config = run.config()?;
            let channel = config.channel().to_string();
            let mut definitions = vec![MetDefinition::standard()];
            if with_puppi {
                definitions.push(MetDefinition::puppi());
            }
            report(pipeline::produce(&config, |source| {
                let kernel = Box::new(LikelihoodScan::default());
                let transform = SvFitReconstructor::bind(source, &channel, &definitions, kernel)?;
                Ok(Box::new(transform) as Box<dyn EventTransform>)
            })?);
        }
        Some(Commands::Plan {
            inputs,
            events_per_job,
            variant,
            tree,
            output,
            extra,
        }) => {
            let jobs = jobs::plan_jobs(&inputs, &tree, events_per_job, &variant, &extra)?;
            jobs::write_job_database(&output, &jobs)?;
            info!(jobs = jobs.len(), database = %output.display(), "wrote job database");
        }
        Some(Commands::Merge {
            input,
            folder,
            tree,
            shard_directory,
        }) => {
            let (output, rows) = jobs::merge_shards(&input, &folder, &tree, &shard_directory)?;
            info!(output = %output.display(), rows, "merged friend tree");
        }
        None => Cli::command().print_help()?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
