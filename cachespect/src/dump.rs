//! Cache dump snapshots

// Imports
use {
	crate::{
		accesses::{Accesses, PagePtr, Pid},
		region::Regions,
	},
	anyhow::Context,
	cachespect_util::ParseIntLit,
	std::{
		collections::BTreeMap,
		fmt, fs,
		io::{BufRead, BufReader},
		path::{Path, PathBuf},
	},
};

/// Dump file basename prefix, `cachedump<N>.csv`
pub const DUMP_FILE_PREFIX: &str = "cachedump";

/// Entry counters for one dump file.
///
/// `total == bad + unresolved + accepted` always holds; `undeclared`
/// counts the subset of accepted entries whose pid was not in the pid
/// list.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct EntryStats {
	/// All lines
	pub total: u64,

	/// Malformed lines
	pub bad: u64,

	/// Lines carrying the unresolved-pid sentinel
	pub unresolved: u64,

	/// Lines attributed to a process
	pub accepted: u64,

	/// Accepted lines whose pid was not declared
	pub undeclared: u64,
}

/// One cache snapshot.
///
/// Parses its dump file on construction and, for every pid seen, the
/// companion maps snapshot next to it when one exists. Immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct CacheDump {
	/// Source dump file
	source: PathBuf,

	/// Snapshot id, from the source file name
	index: Option<String>,

	/// Per-pid accesses
	accesses: BTreeMap<Pid, Accesses>,

	/// Per-pid regions, for pids with a maps snapshot
	regions: BTreeMap<Pid, Regions>,

	/// Entry counters
	stats: EntryStats,
}

impl CacheDump {
	/// Loads a dump from `path`.
	///
	/// `declared_pids` pre-seeds the per-pid accesses; any further
	/// non-negative pid encountered in the file is added on first
	/// sight. Lines with a negative pid are counted as unresolved and
	/// not attributed; malformed lines are counted and skipped.
	///
	/// After parsing, the companion maps snapshot `<pid>-<N>.txt` is
	/// looked up next to the dump for every pid present; pids without
	/// one simply carry no region classification.
	pub fn load(path: &Path, declared_pids: &[Pid], page_size: u64) -> Result<Self, anyhow::Error> {
		let file = fs::File::open(path).with_context(|| format!("Unable to open dump file: {path:?}"))?;

		// Parse the dump entries
		let mut accesses = declared_pids
			.iter()
			.map(|&pid| (pid, Accesses::new(pid)))
			.collect::<BTreeMap<_, _>>();
		let mut stats = EntryStats::default();
		for line in BufReader::new(file).lines() {
			let line = line.context("Unable to read line")?;
			stats.total += 1;

			let Some((pid, page)) = line.split_once(',') else {
				stats.bad += 1;
				continue;
			};
			let Ok(raw_pid) = pid.trim().parse::<i64>() else {
				stats.bad += 1;
				continue;
			};
			if raw_pid < 0 {
				stats.unresolved += 1;
				continue;
			}
			let (Ok(pid), Ok(page)) = (u32::try_from(raw_pid), page.trim().parse_u64_lit()) else {
				stats.bad += 1;
				continue;
			};

			let pid = Pid::new(pid);
			accesses
				.entry(pid)
				.or_insert_with(|| Accesses::new(pid))
				.add_access(PagePtr::new(page));
			stats.accepted += 1;
			if !declared_pids.contains(&pid) {
				stats.undeclared += 1;
			}
		}
		tracing::debug!(?path, ?stats, "Parsed dump file");

		// Then try to find the maps snapshot of each pid
		let index = path
			.file_stem()
			.and_then(|stem| stem.to_str())
			.and_then(|stem| stem.strip_prefix(DUMP_FILE_PREFIX))
			.map(str::to_owned);
		let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
		let mut regions = BTreeMap::new();
		if let Some(index) = &index {
			for (&pid, accesses) in &mut accesses {
				let maps_path = base_dir.join(format!("{pid}-{index}.txt"));
				if !maps_path.is_file() {
					tracing::trace!(?maps_path, "No maps snapshot for pid");
					continue;
				}

				let file =
					fs::File::open(&maps_path).with_context(|| format!("Unable to open maps snapshot: {maps_path:?}"))?;
				let pid_regions = Regions::from_reader(BufReader::new(file))
					.with_context(|| format!("Unable to parse maps snapshot: {maps_path:?}"))?;
				accesses.match_to_regions(&pid_regions, page_size);
				regions.insert(pid, pid_regions);
			}
		}

		Ok(Self {
			source: path.to_path_buf(),
			index,
			accesses,
			regions,
			stats,
		})
	}

	/// Returns the source dump file
	pub fn source(&self) -> &Path {
		&self.source
	}

	/// Returns the snapshot id from the source file name, if it
	/// followed the `cachedump<N>.csv` convention
	pub fn index(&self) -> Option<&str> {
		self.index.as_deref()
	}

	/// Returns the accesses of `pid`
	pub fn accesses(&self, pid: Pid) -> Option<&Accesses> {
		self.accesses.get(&pid)
	}

	/// Returns all pids with accesses, declared pids included
	pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
		self.accesses.keys().copied()
	}

	/// Returns the region list of `pid`, if its maps snapshot was
	/// found
	pub fn regions(&self, pid: Pid) -> Option<&Regions> {
		self.regions.get(&pid)
	}

	/// Returns the entry counters
	pub fn stats(&self) -> EntryStats {
		self.stats
	}

	/// Formats a summary of this dump to `f`.
	///
	/// Reports the entry counters followed by, for each process, the
	/// `top` most hit pages and the contiguous page ranges.
	pub fn fmt_summary(&self, f: &mut fmt::Formatter<'_>, top: usize, page_size: u64) -> fmt::Result {
		let stats = self.stats;
		let pct = |count: u64| 100.0 * count as f64 / stats.total.max(1) as f64;
		writeln!(f, "Total entries: {}", stats.total)?;
		writeln!(f, "Bad: {} ({:.2} %)", stats.bad, pct(stats.bad))?;
		writeln!(f, "No pid: {} ({:.2} %)", stats.unresolved, pct(stats.unresolved))?;
		writeln!(f, "Good: {} ({:.2} %)", stats.accepted, pct(stats.accepted))?;
		writeln!(f, "Undeclared pid: {} ({:.2} %)", stats.undeclared, pct(stats.undeclared))?;

		for (pid, accesses) in &self.accesses {
			writeln!(f, "\nMost accessed pages for pid {pid}:")?;
			for (page, hits) in accesses.ranked(top) {
				writeln!(f, "Page: {page} Lines: {hits}")?;
			}
			for (start, end) in accesses.page_ranges(page_size) {
				let pages = (end.to_u64() - start.to_u64()) / page_size + 1;
				writeln!(f, "[{start} - {end}] ({pages} pages)")?;
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use {super::*, crate::region::RegionIdx, std::fs};

	const PAGE_SIZE: u64 = 0x1000;

	#[test]
	fn counters_partition_entries() {
		let dir = tempfile::tempdir().expect("Unable to create temp dir");
		let dump_path = dir.path().join("cachedump1.csv");
		fs::write(
			&dump_path,
			"100,0x1000\n\
			 100,0x1000\n\
			 101,0x2000\n\
			 -1,0x3000\n\
			 garbage\n\
			 100,not-a-page\n\
			 102,4096\n",
		)
		.expect("Unable to write dump");

		let declared = [Pid::new(100), Pid::new(101)];
		let dump = CacheDump::load(&dump_path, &declared, PAGE_SIZE).expect("Unable to load dump");

		let stats = dump.stats();
		assert_eq!(stats.total, 7);
		assert_eq!(stats.bad, 2);
		assert_eq!(stats.unresolved, 1);
		assert_eq!(stats.accepted, 4);
		assert_eq!(stats.total, stats.bad + stats.unresolved + stats.accepted);

		// Pid 102 was not declared, but still attributed
		assert_eq!(stats.undeclared, 1);
		let undeclared = dump.accesses(Pid::new(102)).expect("Missing undeclared pid");
		assert_eq!(undeclared.hits(PagePtr::new(4096)), 1);

		// Declared pids are present even without entries; hit counts
		// accumulate per page
		let declared = dump.accesses(Pid::new(100)).expect("Missing declared pid");
		assert_eq!(declared.hits(PagePtr::new(0x1000)), 2);
		assert_eq!(dump.accesses(Pid::new(101)).map(Accesses::total_blocks), Some(1));

		// The unresolved sentinel never becomes a process
		assert_eq!(dump.pids().count(), 3);
	}

	#[test]
	fn companion_maps_snapshot_is_matched() {
		let dir = tempfile::tempdir().expect("Unable to create temp dir");
		fs::write(dir.path().join("cachedump7.csv"), "100,0x400000\n100,0x9990000\n").expect("Unable to write dump");
		fs::write(
			dir.path().join("100-7.txt"),
			"00400000-00402000 r-xp 00000000 08:01 1 /usr/bin/app\n",
		)
		.expect("Unable to write maps");

		let dump = CacheDump::load(&dir.path().join("cachedump7.csv"), &[Pid::new(100)], PAGE_SIZE)
			.expect("Unable to load dump");

		assert_eq!(dump.index(), Some("7"));
		let regions = dump.regions(Pid::new(100)).expect("Missing regions");
		assert_eq!(regions.len(), 1);

		let accesses = dump.accesses(Pid::new(100)).expect("Missing accesses");
		assert_eq!(accesses.page_region(PagePtr::new(0x40_0000)), Some(RegionIdx::new(0)));
		assert_eq!(accesses.unmatched(), 1);
	}

	#[test]
	fn missing_maps_snapshot_is_tolerated() {
		let dir = tempfile::tempdir().expect("Unable to create temp dir");
		fs::write(dir.path().join("cachedump2.csv"), "100,0x1000\n").expect("Unable to write dump");

		let dump =
			CacheDump::load(&dir.path().join("cachedump2.csv"), &[Pid::new(100)], PAGE_SIZE).expect("Unable to load dump");

		assert!(dump.regions(Pid::new(100)).is_none());
		let accesses = dump.accesses(Pid::new(100)).expect("Missing accesses");
		assert_eq!(accesses.unmatched(), 0);
		assert_eq!(accesses.page_region(PagePtr::new(0x1000)), None);
	}

	#[test]
	fn missing_dump_file_is_an_error() {
		let dir = tempfile::tempdir().expect("Unable to create temp dir");
		assert!(CacheDump::load(&dir.path().join("cachedump1.csv"), &[], PAGE_SIZE).is_err());
	}
}
