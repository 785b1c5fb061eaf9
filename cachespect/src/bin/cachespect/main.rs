//! Cache snapshot spectrum analysis tool

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	cachespect::{data, Config, MemSpectrum, Pid},
	cachespect_util::{logger, DisplayWrapper},
	clap::Parser,
	std::fs,
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Then check the sub-command
	match args.sub_cmd {
		args::SubCmd::Summary(cmd) => {
			let (spectrum, config) = self::load_experiment(&cmd.experiment)?;

			for (idx, dump) in spectrum.dumps().iter().enumerate() {
				println!("=== Dump {idx} ({}) ===", dump.source().display());
				println!("{}", DisplayWrapper::new(|f| dump.fmt_summary(f, cmd.top, config.page_size)));
			}
		},

		args::SubCmd::Regions(cmd) => {
			let (spectrum, _) = self::load_experiment(&cmd.experiment)?;
			let pid = cmd.pid.map_or(spectrum.subject_pid(), Pid::new);

			for (idx, dump) in spectrum.dumps().iter().enumerate() {
				println!("=== Dump {idx} ===");
				let (Some(accesses), Some(regions)) = (dump.accesses(pid), dump.regions(pid)) else {
					continue;
				};

				for region in regions.iter() {
					let pages = accesses.region_pages(region.index).map_or(0, <[_]>::len);
					println!("Area [{}] ({}) - Pages: {pages}", region.index, region.label);
				}
			}

			println!("\nBusiest regions across the run:");
			for (idx, total, extent) in spectrum.busiest_regions(pid, cmd.busiest) {
				println!("Region [{idx}]: {total} blocks, extent {extent:#x}");
			}
		},

		args::SubCmd::Reuse(cmd) => {
			let (spectrum, config) = self::load_experiment(&cmd.experiment)?;
			let pid = cmd.pid.map_or(spectrum.subject_pid(), Pid::new);
			let cache_lines = config.cache_lines();

			let occupancy = spectrum.occupancy_series(pid, cache_lines);
			let reuse = spectrum.reuse_series(pid);

			println!("snapshot,occupancy,reused");
			for (idx, (quota, reused)) in occupancy.iter().zip(&reuse).enumerate() {
				println!("{idx},{quota:.4},{:.4}", *reused as f64 / cache_lines as f64);
			}

			let occupancy_stats = occupancy.iter().copied().collect::<average::Variance>();
			let reuse_stats = reuse
				.iter()
				.map(|&reused| reused as f64 / cache_lines as f64)
				.collect::<average::Variance>();
			println!(
				"Occupancy: {:.4} ± {:.4}, Reused: {:.4} ± {:.4}",
				occupancy_stats.mean(),
				occupancy_stats.error(),
				reuse_stats.mean(),
				reuse_stats.error()
			);
		},

		args::SubCmd::Interference(cmd) => {
			let (spectrum, config) = self::load_experiment(&cmd.experiment)?;
			let other = MemSpectrum::load(
				Pid::new(0),
				&cmd.other_pid_file,
				cmd.experiment.start_idx,
				cmd.experiment.stop_idx,
				config.page_size,
			)
			.context("Unable to load interfering experiment")?;

			// Default to the last declared pid of each experiment, the
			// process launched last by the capture scripts
			let pid = match cmd.pid {
				Some(pid) => Pid::new(pid),
				None => spectrum
					.declared_pids()
					.last()
					.copied()
					.context("Experiment declares no pids")?,
			};
			let other_pid = match cmd.other_pid {
				Some(pid) => Pid::new(pid),
				None => other
					.declared_pids()
					.last()
					.copied()
					.context("Interfering experiment declares no pids")?,
			};

			let scores = spectrum.interference(&other, pid, other_pid, config.cache_lines());
			println!(
				"Pid {pid} interfered by {other_pid}: excess quota {:.4}, reused pressure {:.4}",
				scores.excess_quota, scores.reused_pressure
			);
		},

		args::SubCmd::Export(cmd) => {
			let (spectrum, _) = self::load_experiment(&cmd.experiment)?;

			let data = data::Data {
				subject_pid: spectrum.subject_pid().to_u32(),
				declared_pids: spectrum.declared_pids().iter().map(|pid| pid.to_u32()).collect(),
				total_iters: spectrum.total_iters(),
				dumps: spectrum
					.dumps()
					.iter()
					.map(|dump| data::DumpData {
						source: dump.source().display().to_string(),
						entries: dump.stats(),
						processes: dump
							.pids()
							.map(|pid| {
								let accesses = dump.accesses(pid).expect("Pid was listed by the dump");
								data::ProcessData {
									pid: pid.to_u32(),
									total_blocks: accesses.total_blocks(),
									pages: accesses.pages().map(|(page, hits)| (page.to_u64(), hits)).collect(),
									unmatched_pages: accesses.unmatched(),
									regions: dump.regions(pid).map(|regions| {
										regions
											.iter()
											.map(|region| data::RegionData {
												start: region.start,
												end: region.end,
												perms: region.perms.clone(),
												path: region.path.clone(),
												label: region.label.clone(),
												kind: region.kind,
												matched_pages: accesses
													.region_pages(region.index)
													.map_or(0, <[_]>::len)
													as u64,
											})
											.collect()
									}),
								}
							})
							.collect(),
					})
					.collect(),
			};

			let output_file = fs::File::create(&cmd.output_file).context("Unable to create output file")?;
			serde_json::to_writer(output_file, &data).context("Unable to write to output file")?;
		},
	}

	Ok(())
}

/// Loads the experiment described by `experiment`, along with its
/// config
fn load_experiment(experiment: &args::Experiment) -> Result<(MemSpectrum, Config), anyhow::Error> {
	let config = match &experiment.config_file {
		Some(config_file) => {
			let config_file = fs::File::open(config_file).context("Unable to open config file")?;
			serde_json::from_reader::<_, Config>(config_file).context("Unable to parse config file")?
		},
		None => Config::default(),
	};

	let spectrum = MemSpectrum::load(
		Pid::new(experiment.subject_pid),
		&experiment.pid_file,
		experiment.start_idx,
		experiment.stop_idx,
		config.page_size,
	)
	.context("Unable to load experiment")?;

	Ok((spectrum, config))
}
