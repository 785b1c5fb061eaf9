//! Arguments

// Imports
use std::path::PathBuf;

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Sub-command
	#[command(subcommand)]
	pub sub_cmd: SubCmd,
}

/// Sub-command
#[derive(Debug, clap::Subcommand)]
pub enum SubCmd {
	#[clap(name = "summary")]
	Summary(Summary),

	#[clap(name = "regions")]
	Regions(Regions),

	#[clap(name = "reuse")]
	Reuse(Reuse),

	#[clap(name = "interference")]
	Interference(Interference),

	#[clap(name = "export")]
	Export(Export),
}

/// Prints entry counters, top pages and page ranges per snapshot
#[derive(Debug, clap::Args)]
pub struct Summary {
	/// Experiment
	#[clap(flatten)]
	pub experiment: Experiment,

	/// Number of top pages to report per process
	#[clap(long = "top", default_value_t = 10)]
	pub top: usize,
}

/// Prints per-region block counts per snapshot
#[derive(Debug, clap::Args)]
pub struct Regions {
	/// Experiment
	#[clap(flatten)]
	pub experiment: Experiment,

	/// Pid to report on, defaults to the subject pid
	#[clap(long = "pid")]
	pub pid: Option<u32>,

	/// Number of regions in the whole-run ranking
	#[clap(long = "busiest", default_value_t = 4)]
	pub busiest: usize,
}

/// Prints per-snapshot occupancy and reuse series
#[derive(Debug, clap::Args)]
pub struct Reuse {
	/// Experiment
	#[clap(flatten)]
	pub experiment: Experiment,

	/// Pid to report on, defaults to the subject pid
	#[clap(long = "pid")]
	pub pid: Option<u32>,
}

/// Scores the interference another experiment induces on this one
#[derive(Debug, clap::Args)]
pub struct Interference {
	/// Experiment
	#[clap(flatten)]
	pub experiment: Experiment,

	/// Pid list file of the interfering experiment
	pub other_pid_file: PathBuf,

	/// Pid to score, defaults to the last declared pid
	#[clap(long = "pid")]
	pub pid: Option<u32>,

	/// Interfering pid, defaults to the other experiment's last
	/// declared pid
	#[clap(long = "other-pid")]
	pub other_pid: Option<u32>,
}

/// Exports the experiment as JSON
#[derive(Debug, clap::Args)]
pub struct Export {
	/// Experiment
	#[clap(flatten)]
	pub experiment: Experiment,

	/// Output file
	#[clap(short = 'o', long = "output")]
	pub output_file: PathBuf,
}

/// Experiment coordinates
#[derive(Debug, clap::Args)]
pub struct Experiment {
	/// Pid list file, next to the snapshots
	pub pid_file: PathBuf,

	/// Subject pid of the experiment
	#[clap(long = "subject-pid", default_value_t = 0)]
	pub subject_pid: u32,

	/// First snapshot index to load
	#[clap(long = "start", default_value_t = 1)]
	pub start_idx: usize,

	/// Last snapshot index to load, defaults to the iteration count
	/// declared by the pid list
	#[clap(long = "stop")]
	pub stop_idx: Option<usize>,

	/// Config file
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,
}
