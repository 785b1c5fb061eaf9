//! Per-process cache block accesses

// Imports
use {
	crate::region::{RegionIdx, Regions},
	itertools::Itertools,
	std::{cmp::Reverse, collections::BTreeMap, fmt},
};

/// Process id.
///
/// Dump files use a signed pid column where negative values mean the
/// block could not be resolved to a process; those never become a
/// `Pid`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct Pid(u32);

impl Pid {
	/// Creates a pid from its raw id
	pub const fn new(pid: u32) -> Self {
		Self(pid)
	}

	/// Returns the pid as a `u32`
	pub const fn to_u32(self) -> u32 {
		self.0
	}
}

impl fmt::Display for Pid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Page pointer.
///
/// Address of one tracked page in the monitored process's address
/// space.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct PagePtr(u64);

impl PagePtr {
	/// Creates a page pointer from a `u64`
	pub const fn new(addr: u64) -> Self {
		Self(addr)
	}

	/// Returns the page pointer as a `u64`
	pub const fn to_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for PagePtr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("PagePtr")
			.field(&format_args!("{:#010x}", self.0))
			.finish()
	}
}

impl fmt::Display for PagePtr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

/// Cache block accesses of one process within one snapshot.
///
/// Filled by [`add_access`](Self::add_access) while the owning dump is
/// parsed, then matched against the process's region list at most
/// once. Read-only afterwards.
#[derive(Clone, Debug)]
pub struct Accesses {
	/// Process id
	pid: Pid,

	/// Hit count per page
	pages: BTreeMap<PagePtr, u64>,

	/// Total block count, the sum of all hit counts
	total_blocks: u64,

	/// Region of each matched page
	page_regions: BTreeMap<PagePtr, RegionIdx>,

	/// Matched pages of each region
	region_pages: BTreeMap<RegionIdx, Vec<PagePtr>>,

	/// Pages that matched no region
	unmatched: u64,
}

impl Accesses {
	/// Creates empty accesses for `pid`
	pub fn new(pid: Pid) -> Self {
		Self {
			pid,
			pages: BTreeMap::new(),
			total_blocks: 0,
			page_regions: BTreeMap::new(),
			region_pages: BTreeMap::new(),
			unmatched: 0,
		}
	}

	/// Returns the pid these accesses belong to
	pub fn pid(&self) -> Pid {
		self.pid
	}

	/// Registers one cache block hit on `page`
	pub fn add_access(&mut self, page: PagePtr) {
		*self.pages.entry(page).or_insert(0) += 1;
		self.total_blocks += 1;
	}

	/// Returns the hit count of `page`, 0 if it was never hit
	pub fn hits(&self, page: PagePtr) -> u64 {
		self.pages.get(&page).copied().unwrap_or(0)
	}

	/// Returns the total block count
	pub fn total_blocks(&self) -> u64 {
		self.total_blocks
	}

	/// Returns all pages and their hit counts, by ascending address
	pub fn pages(&self) -> impl Iterator<Item = (PagePtr, u64)> + '_ {
		self.pages.iter().map(|(&page, &hits)| (page, hits))
	}

	/// Returns the number of distinct pages hit
	pub fn page_count(&self) -> usize {
		self.pages.len()
	}

	/// Returns the `count` most hit pages, most hit first
	pub fn ranked(&self, count: usize) -> Vec<(PagePtr, u64)> {
		self.pages()
			.sorted_by_key(|&(_, hits)| Reverse(hits))
			.take(count)
			.collect()
	}

	/// Returns the hit count of each page in `pages`, scaled by
	/// `scale`. Pages never hit weigh 0.
	pub fn weights(&self, pages: &[PagePtr], scale: f64) -> Vec<f64> {
		pages.iter().map(|&page| self.hits(page) as f64 * scale).collect()
	}

	/// Returns the number of blocks consistent with having stayed
	/// cached between these accesses and `other`.
	///
	/// For every page present in both, the smaller of the two hit
	/// counts is accumulated: a conservative multiset intersection
	/// size, symmetric in its arguments.
	pub fn reused_blocks(&self, other: &Self) -> u64 {
		self.pages
			.iter()
			.filter_map(|(page, &hits)| other.pages.get(page).map(|&other_hits| hits.min(other_hits)))
			.sum()
	}

	/// Returns the maximal contiguous page ranges, by ascending
	/// address.
	///
	/// Pages one `page_size` apart belong to the same range; both ends
	/// are inclusive, so an isolated page yields `(page, page)`.
	pub fn page_ranges(&self, page_size: u64) -> Vec<(PagePtr, PagePtr)> {
		let mut ranges = vec![];
		let mut cur: Option<(u64, u64)> = None;
		for &page in self.pages.keys() {
			let page = page.to_u64();
			cur = match cur {
				Some((start, end)) if page == end + page_size => Some((start, page)),
				Some((start, end)) => {
					ranges.push((PagePtr::new(start), PagePtr::new(end)));
					Some((page, page))
				},
				None => Some((page, page)),
			};
		}
		if let Some((start, end)) = cur {
			ranges.push((PagePtr::new(start), PagePtr::new(end)));
		}

		ranges
	}

	/// Matches every page against `regions`.
	///
	/// Each page is assigned to the first region, in list order, that
	/// contains it; pages contained by no region only increment the
	/// unmatched counter. Every region gets a (possibly empty) page
	/// list.
	pub fn match_to_regions(&mut self, regions: &Regions, page_size: u64) {
		for region in regions.iter() {
			self.region_pages.entry(region.index).or_default();
		}

		for &page in self.pages.keys() {
			match regions.iter().find(|region| region.contains(page, page_size)) {
				Some(region) => {
					self.page_regions.insert(page, region.index);
					self.region_pages.entry(region.index).or_default().push(page);
				},
				None => self.unmatched += 1,
			}
		}
	}

	/// Returns the region `page` was matched to, if any
	pub fn page_region(&self, page: PagePtr) -> Option<RegionIdx> {
		self.page_regions.get(&page).copied()
	}

	/// Returns the pages matched to region `idx`.
	///
	/// `None` if no region list was ever matched, or `idx` wasn't part
	/// of it.
	pub fn region_pages(&self, idx: RegionIdx) -> Option<&[PagePtr]> {
		self.region_pages.get(&idx).map(Vec::as_slice)
	}

	/// Returns the number of pages that matched no region
	pub fn unmatched(&self) -> u64 {
		self.unmatched
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::region::Region,
		std::io::BufReader,
	};

	/// Builds accesses from `(page, hits)` pairs
	fn accesses(pairs: &[(u64, u64)]) -> Accesses {
		let mut accesses = Accesses::new(Pid::new(100));
		for &(page, hits) in pairs {
			for _ in 0..hits {
				accesses.add_access(PagePtr::new(page));
			}
		}
		accesses
	}

	#[test]
	fn total_blocks_is_sum_of_hits() {
		let accesses = accesses(&[(0x1000, 3), (0x2000, 1), (0x5000, 4)]);

		assert_eq!(accesses.total_blocks(), 8);
		assert_eq!(accesses.total_blocks(), accesses.pages().map(|(_, hits)| hits).sum::<u64>());
		assert_eq!(accesses.hits(PagePtr::new(0x1000)), 3);
		assert_eq!(accesses.hits(PagePtr::new(0x3000)), 0);
		assert_eq!(accesses.page_count(), 3);
	}

	#[test]
	fn ranked_orders_by_hits() {
		let accesses = accesses(&[(0x1000, 2), (0x2000, 7), (0x3000, 5)]);

		let ranked = accesses.ranked(2);
		assert_eq!(ranked, [(PagePtr::new(0x2000), 7), (PagePtr::new(0x3000), 5)]);

		// Asking for more than exists returns everything
		assert_eq!(accesses.ranked(10).len(), 3);
	}

	#[test]
	fn weights_scale_hits() {
		let accesses = accesses(&[(0x1000, 2), (0x2000, 4)]);

		let pages = [PagePtr::new(0x2000), PagePtr::new(0x1000), PagePtr::new(0x9000)];
		assert_eq!(accesses.weights(&pages, 1.5), [6.0, 3.0, 0.0]);
	}

	#[test]
	fn reused_blocks_is_min_sum() {
		let lhs = accesses(&[(0x1000, 3), (0x2000, 1), (0x4000, 2)]);
		let rhs = accesses(&[(0x1000, 1), (0x4000, 5), (0x8000, 7)]);

		assert_eq!(lhs.reused_blocks(&rhs), 1 + 2);
		assert_eq!(lhs.reused_blocks(&rhs), rhs.reused_blocks(&lhs));
	}

	#[test]
	fn reused_blocks_with_self_is_total() {
		let unit = accesses(&[(0x1000, 1), (0x2000, 1), (0x7000, 1)]);
		assert_eq!(unit.reused_blocks(&unit), unit.total_blocks());

		let multi = accesses(&[(0x1000, 4), (0x2000, 2)]);
		assert_eq!(multi.reused_blocks(&multi), 6);
	}

	#[test]
	fn page_ranges_merge_adjacent_pages() {
		let accesses = accesses(&[(0x1000, 1), (0x2000, 1), (0x4000, 1)]);

		assert_eq!(accesses.page_ranges(0x1000), [
			(PagePtr::new(0x1000), PagePtr::new(0x2000)),
			(PagePtr::new(0x4000), PagePtr::new(0x4000)),
		]);
	}

	#[test]
	fn page_ranges_empty() {
		let accesses = Accesses::new(Pid::new(1));
		assert!(accesses.page_ranges(0x1000).is_empty());
	}

	/// Parses a region list from maps lines
	fn regions(lines: &str) -> Regions {
		Regions::from_reader(BufReader::new(lines.as_bytes())).expect("Unable to parse regions")
	}

	#[test]
	fn match_to_regions_partitions_pages() {
		let regions = regions(
			"00400000-00402000 r-xp 00000000 08:01 1234 /usr/bin/app\n\
			 00602000-00603000 rw-p 00002000 08:01 1234 /usr/bin/app\n\
			 7f0000000000-7f0000004000 rw-p 00000000 00:00 0\n",
		);

		let mut accesses = accesses(&[
			(0x400000, 2),
			(0x401000, 1),
			(0x602000, 1),
			(0x7f0000001000, 3),
			(0xdead0000, 1),
		]);
		accesses.match_to_regions(&regions, 0x1000);

		// Partition: every page is in exactly one region list or unmatched
		let matched = (0..regions.len())
			.filter_map(|idx| accesses.region_pages(RegionIdx::new(idx)))
			.map(<[PagePtr]>::len)
			.sum::<usize>();
		assert_eq!(matched as u64 + accesses.unmatched(), accesses.page_count() as u64);
		assert_eq!(accesses.unmatched(), 1);

		assert_eq!(accesses.page_region(PagePtr::new(0x400000)), Some(RegionIdx::new(0)));
		assert_eq!(accesses.page_region(PagePtr::new(0x602000)), Some(RegionIdx::new(1)));
		assert_eq!(accesses.page_region(PagePtr::new(0x7f0000001000)), Some(RegionIdx::new(2)));
		assert_eq!(accesses.page_region(PagePtr::new(0xdead0000)), None);
	}

	#[test]
	fn match_to_regions_first_match_wins() {
		// Overlapping regions: list order decides
		let regions = regions(
			"00001000-00004000 rw-p 00000000 00:00 0\n\
			 00002000-00005000 rw-p 00000000 00:00 0\n",
		);

		let mut accesses = accesses(&[(0x2000, 1)]);
		accesses.match_to_regions(&regions, 0x1000);

		assert_eq!(accesses.page_region(PagePtr::new(0x2000)), Some(RegionIdx::new(0)));
		assert_eq!(accesses.region_pages(RegionIdx::new(1)), Some(&[][..]));
	}

	#[test]
	fn match_to_regions_boundary_tolerance() {
		let region = Region::from_maps_line("00001000-00002000 rw-p 00000000 00:00 0", RegionIdx::new(0))
			.expect("Unable to parse region");

		// A page landing exactly on `end` is still matched, one page
		// further is not
		assert!(region.contains(PagePtr::new(0x2000), 0x1000));
		assert!(!region.contains(PagePtr::new(0x3000), 0x1000));
		assert!(!region.contains(PagePtr::new(0xfff), 0x1000));
	}
}
