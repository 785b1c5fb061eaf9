//! Logger

// Imports
use {
	std::{
		fs,
		path::Path,
		sync::{Arc, Mutex},
	},
	tracing_subscriber::{prelude::*, EnvFilter},
};

/// Logging before the logger is initialized.
///
/// Messages are buffered and emitted once [`init`] installs the
/// subscriber.
pub mod pre_init {
	/// Buffered messages
	pub(super) static MESSAGES: super::Mutex<Vec<String>> = super::Mutex::new(Vec::new());

	/// Records a debug message to emit once the logger is initialized
	pub fn debug(msg: impl Into<String>) {
		MESSAGES.lock().expect("Poisoned").push(msg.into());
	}
}

/// Initializes the logger.
///
/// Logs to stderr, filtered by `RUST_LOG` (defaulting to `info`) and,
/// if `log_file` is given, to it as well, filtered by `RUST_LOG_FILE`
/// (defaulting to `debug`).
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	// Create the stderr layer
	let stderr_layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stderr)
		.with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")));

	// Then the file layer, if requested
	let file_layer = log_file.map(|log_file| {
		let file = fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.open(log_file)
			.expect("Unable to open log file");

		tracing_subscriber::fmt::layer()
			.with_ansi(false)
			.with_writer(Arc::new(file))
			.with_filter(EnvFilter::try_from_env("RUST_LOG_FILE").unwrap_or_else(|_| EnvFilter::new("debug")))
	});

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();

	// Finally emit any buffered pre-initialization messages
	for msg in pre_init::MESSAGES.lock().expect("Poisoned").drain(..) {
		tracing::debug!(target: "pre_init", "{msg}");
	}
}
