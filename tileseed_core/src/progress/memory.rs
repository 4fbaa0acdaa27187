use super::ProgressSink;
use std::sync::Mutex;

/// Collects progress lines in memory so tests can assert on them.
#[derive(Default)]
pub struct MemoryProgress {
	lines: Mutex<Vec<String>>,
}

impl MemoryProgress {
	pub fn new() -> MemoryProgress {
		MemoryProgress::default()
	}

	pub fn lines(&self) -> Vec<String> {
		self.lines.lock().unwrap().clone()
	}
}

impl ProgressSink for MemoryProgress {
	fn message(&self, line: &str) {
		self.lines.lock().unwrap().push(line.to_string());
	}
}
