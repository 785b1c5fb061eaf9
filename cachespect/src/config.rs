//! Configuration

/// Configuration.
///
/// Describes the capture setup the snapshots came from; every field
/// has a default matching the reference setup.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
	/// Page size of the captured snapshots, in bytes
	#[serde(default = "default_page_size")]
	pub page_size: u64,

	/// Total cache size, in bytes
	#[serde(default = "default_cache_size")]
	pub cache_size: u64,

	/// Cache line size, in bytes
	#[serde(default = "default_cache_line_size")]
	pub cache_line_size: u64,
}

impl Config {
	/// Returns the number of lines in the cache
	pub fn cache_lines(&self) -> u64 {
		self.cache_size / self.cache_line_size
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			page_size: default_page_size(),
			cache_size: default_cache_size(),
			cache_line_size: default_cache_line_size(),
		}
	}
}

fn default_page_size() -> u64 {
	0x1000
}

fn default_cache_size() -> u64 {
	2 * 1024 * 1024
}

fn default_cache_line_size() -> u64 {
	64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_fill_missing_fields() {
		let config = serde_json::from_str::<Config>("{}").expect("Unable to parse config");
		assert_eq!(config.page_size, 0x1000);
		assert_eq!(config.cache_lines(), 32768);

		let config = serde_json::from_str::<Config>(r#"{ "cache_size": 1048576 }"#).expect("Unable to parse config");
		assert_eq!(config.cache_lines(), 16384);
	}
}
