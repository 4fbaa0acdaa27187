use super::ProgressSink;
use std::io::Write;

/// Writes each progress line to stdout, one locked write per line so
/// concurrent workers cannot interleave within a line.
pub struct StdoutProgress;

impl ProgressSink for StdoutProgress {
	fn message(&self, line: &str) {
		let stdout = std::io::stdout();
		let mut lock = stdout.lock();
		let _ = writeln!(lock, "{line}");
		let _ = lock.flush();
	}
}
