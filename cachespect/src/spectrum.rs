//! Experiment spectrums

// Imports
use {
	crate::{
		accesses::{Accesses, Pid},
		dump::{self, CacheDump},
		region::RegionIdx,
	},
	anyhow::Context,
	itertools::Itertools,
	std::{
		cmp::Reverse,
		fs,
		io::{BufRead, BufReader},
		path::{Path, PathBuf},
	},
};

/// One experiment run: the ordered snapshot sequence captured
/// alongside a pid list.
#[derive(Clone, Debug)]
pub struct MemSpectrum {
	/// Subject pid of the experiment
	subject_pid: Pid,

	/// Pid list file the experiment was loaded from
	pid_file: PathBuf,

	/// Directory the snapshots live in
	base_dir: PathBuf,

	/// Requested snapshot index range, inclusive
	idx_range: (usize, usize),

	/// Iteration count declared by the pid list
	total_iters: usize,

	/// Declared pids, in declaration order
	declared_pids: Vec<Pid>,

	/// Snapshots, ordered by index, gap-free
	dumps: Vec<CacheDump>,

	/// Page size of the snapshots
	page_size: u64,
}

impl MemSpectrum {
	/// Loads an experiment from its pid list file.
	///
	/// The pid list declares the iteration count on its first line and
	/// one pid per following line, in significant order. Snapshots
	/// `start_idx..=stop_idx` are then loaded from the pid file's
	/// directory, with `stop_idx` defaulting to the declared iteration
	/// count.
	///
	/// Loading stops at the first missing snapshot, so the resulting
	/// sequence never contains holes; it may be shorter than the
	/// requested range.
	pub fn load(
		subject_pid: Pid,
		pid_file: &Path,
		start_idx: usize,
		stop_idx: Option<usize>,
		page_size: u64,
	) -> Result<Self, anyhow::Error> {
		// Parse the pid list
		let file = fs::File::open(pid_file).with_context(|| format!("Unable to open pid file: {pid_file:?}"))?;
		let mut lines = BufReader::new(file).lines();
		let total_iters = lines
			.next()
			.context("Pid file is empty")?
			.context("Unable to read line")?
			.trim()
			.parse::<usize>()
			.context("Unable to parse iteration count")?;

		let mut declared_pids = vec![];
		for line in lines {
			let line = line.context("Unable to read line")?;
			let pid = line
				.trim()
				.parse::<u32>()
				.with_context(|| format!("Unable to parse pid: {line:?}"))?;
			declared_pids.push(Pid::new(pid));
		}

		// Then load snapshots until the range, or the files, run out
		let stop_idx = stop_idx.unwrap_or(total_iters);
		let base_dir = pid_file.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
		let mut dumps = vec![];
		for idx in start_idx..=stop_idx {
			let dump_file = base_dir.join(format!("{}{idx}.csv", dump::DUMP_FILE_PREFIX));
			if !dump_file.is_file() {
				tracing::warn!(?dump_file, "Missing snapshot, stopping load");
				break;
			}

			tracing::info!(?dump_file, "Parsing snapshot");
			let dump = CacheDump::load(&dump_file, &declared_pids, page_size)
				.with_context(|| format!("Unable to load dump: {dump_file:?}"))?;
			dumps.push(dump);
		}

		Ok(Self {
			subject_pid,
			pid_file: pid_file.to_path_buf(),
			base_dir,
			idx_range: (start_idx, stop_idx),
			total_iters,
			declared_pids,
			dumps,
			page_size,
		})
	}

	/// Returns the subject pid
	pub fn subject_pid(&self) -> Pid {
		self.subject_pid
	}

	/// Returns the pid list file the experiment was loaded from
	pub fn pid_file(&self) -> &Path {
		&self.pid_file
	}

	/// Returns the directory the snapshots live in
	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	/// Returns the requested snapshot index range, inclusive.
	///
	/// The loaded sequence is at most `stop - start + 1` snapshots
	/// long, shorter when the files ran out first.
	pub fn idx_range(&self) -> (usize, usize) {
		self.idx_range
	}

	/// Returns the iteration count declared by the pid list
	pub fn total_iters(&self) -> usize {
		self.total_iters
	}

	/// Returns the declared pids, in declaration order
	pub fn declared_pids(&self) -> &[Pid] {
		&self.declared_pids
	}

	/// Returns the loaded snapshots, ordered by index
	pub fn dumps(&self) -> &[CacheDump] {
		&self.dumps
	}

	/// Returns the page size of the snapshots
	pub fn page_size(&self) -> u64 {
		self.page_size
	}

	/// Returns the total number of blocks matched to region
	/// `region_idx` of `pid`, across all snapshots
	pub fn total_blocks_in_region(&self, pid: Pid, region_idx: RegionIdx) -> usize {
		self.dumps
			.iter()
			.filter_map(|dump| dump.accesses(pid))
			.filter_map(|accesses| accesses.region_pages(region_idx))
			.map(<[_]>::len)
			.sum()
	}

	/// Returns the address extent spanned by the blocks matched to
	/// region `region_idx` of `pid`, across all snapshots.
	///
	/// 0 when no snapshot matched a block to the region.
	pub fn region_extent(&self, pid: Pid, region_idx: RegionIdx) -> u64 {
		self.dumps
			.iter()
			.filter_map(|dump| dump.accesses(pid))
			.filter_map(|accesses| accesses.region_pages(region_idx))
			.flat_map(|pages| pages.iter().copied())
			.minmax()
			.into_option()
			.map_or(0, |(min, max)| max.to_u64() - min.to_u64())
	}

	/// Returns the `count` regions of `pid` with the most matched
	/// blocks across all snapshots, busiest first, as
	/// `(region index, total blocks, extent)`.
	///
	/// Region indices are drawn from the first snapshot carrying a
	/// region list for `pid`; empty when no snapshot does.
	pub fn busiest_regions(&self, pid: Pid, count: usize) -> Vec<(RegionIdx, usize, u64)> {
		let Some(regions) = self.dumps.iter().find_map(|dump| dump.regions(pid)) else {
			return vec![];
		};

		regions
			.iter()
			.map(|region| {
				let idx = region.index;
				(idx, self.total_blocks_in_region(pid, idx), self.region_extent(pid, idx))
			})
			.sorted_by_key(|&(_, total, _)| Reverse(total))
			.take(count)
			.collect()
	}

	/// Returns the fraction of a `cache_lines`-sized cache occupied by
	/// `pid` in each snapshot
	pub fn occupancy_series(&self, pid: Pid, cache_lines: u64) -> Vec<f64> {
		self.dumps
			.iter()
			.map(|dump| dump.accesses(pid).map_or(0, Accesses::total_blocks) as f64 / cache_lines as f64)
			.collect()
	}

	/// Returns the number of blocks reused from the previous snapshot,
	/// per snapshot.
	///
	/// The first snapshot has nothing to reuse from and reports 0.
	pub fn reuse_series(&self, pid: Pid) -> Vec<u64> {
		let mut series = Vec::with_capacity(self.dumps.len());
		let mut prev: Option<&Accesses> = None;
		for dump in &self.dumps {
			let cur = dump.accesses(pid);
			let reused = match (cur, prev) {
				(Some(cur), Some(prev)) => cur.reused_blocks(prev),
				_ => 0,
			};
			series.push(reused);
			prev = cur;
		}

		series
	}

	/// Scores the interference `other` induces on this experiment.
	///
	/// For every snapshot index of this experiment, accumulates the
	/// excess cache quota `max(0, q_self + q_other - 1)` and the
	/// reuse-weighted pressure `(reused_self / cache_lines) * q_other`,
	/// both normalized by this experiment's snapshot count. Snapshot
	/// indices past the end of `other` contribute only their own
	/// quota.
	pub fn interference(&self, other: &Self, self_pid: Pid, other_pid: Pid, cache_lines: u64) -> Interference {
		let self_quota = self.occupancy_series(self_pid, cache_lines);
		let other_quota = other.occupancy_series(other_pid, cache_lines);
		let self_reuse = self.reuse_series(self_pid);

		let mut excess_quota = 0.0;
		let mut reused_pressure = 0.0;
		for (idx, (&quota, &reused)) in self_quota.iter().zip(&self_reuse).enumerate() {
			let other_quota = other_quota.get(idx).copied().unwrap_or(0.0);
			excess_quota += (quota + other_quota - 1.0).max(0.0);
			reused_pressure += (reused as f64 / cache_lines as f64) * other_quota;
		}

		let count = self.dumps.len().max(1) as f64;
		Interference {
			excess_quota: excess_quota / count,
			reused_pressure: reused_pressure / count,
		}
	}
}

/// Interference scores between two experiments
#[derive(Clone, Copy, Debug)]
pub struct Interference {
	/// Mean excess cache quota per snapshot
	pub excess_quota: f64,

	/// Mean reuse-weighted cache pressure per snapshot
	pub reused_pressure: f64,
}
