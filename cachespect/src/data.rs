//! Output data

// Imports
use {
	crate::{dump::EntryStats, region::RegionKind},
	std::collections::BTreeMap,
};

/// Output data for a whole experiment
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Data {
	pub subject_pid: u32,
	pub declared_pids: Vec<u32>,
	pub total_iters: usize,
	pub dumps: Vec<DumpData>,
}

/// Output data for one snapshot
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DumpData {
	pub source: String,
	pub entries: EntryStats,
	pub processes: Vec<ProcessData>,
}

/// Output data for one process within one snapshot
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ProcessData {
	pub pid: u32,
	pub total_blocks: u64,

	// Note: We use a `BTreeMap` to keep the pages sorted by address
	pub pages: BTreeMap<u64, u64>,

	pub unmatched_pages: u64,
	pub regions: Option<Vec<RegionData>>,
}

/// Output data for one region of one process
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RegionData {
	pub start: u64,
	pub end: u64,
	pub perms: String,
	pub path: String,
	pub label: String,
	pub kind: RegionKind,
	pub matched_pages: u64,
}
