use crate::ui::Reporter;
use humansize::{format_size, DECIMAL};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const REPORT_STEP_PERCENT: u64 = 5;

#[derive(Clone)]
pub struct TransferProgress {
    reporter: Option<Arc<dyn Reporter>>,
    label: String,
    total_bytes: u64,
    start_time: Instant,
    transferred_bytes: Arc<AtomicU64>,
    last_reported_percent: Arc<AtomicU64>,
}

impl TransferProgress {
    pub fn new(reporter: Arc<dyn Reporter>, label: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            reporter: Some(reporter),
            label: label.into(),
            total_bytes,
            start_time: Instant::now(),
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            last_reported_percent: Arc::new(AtomicU64::new(u64::MAX)),
        }
    }

    pub fn new_noop() -> Self {
        Self {
            reporter: None,
            label: String::new(),
            total_bytes: 0,
            start_time: Instant::now(),
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            last_reported_percent: Arc::new(AtomicU64::new(u64::MAX)),
        }
    }

    pub fn record_bytes(&self, bytes: u64) {
        let total_transferred = self.transferred_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.report(total_transferred);
    }

    /// Restarts the count, e.g. when a resume attempt falls back to a fresh
    /// upload of the whole content.
    pub fn reset(&self) {
        self.transferred_bytes.store(0, Ordering::Relaxed);
        self.last_reported_percent
            .store(u64::MAX, Ordering::Relaxed);
    }

    pub fn complete(&self) {
        self.transferred_bytes
            .store(self.total_bytes, Ordering::Relaxed);
        self.report(self.total_bytes);
        if let Some(reporter) = &self.reporter {
            reporter.progress("\n");
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    fn report(&self, total_transferred: u64) {
        let Some(reporter) = &self.reporter else {
            return;
        };

        let percent = if self.total_bytes > 0 {
            (total_transferred.saturating_mul(100) / self.total_bytes).min(100)
        } else {
            100
        };
        let bucket = percent / REPORT_STEP_PERCENT;
        if self.last_reported_percent.swap(bucket, Ordering::Relaxed) == bucket {
            return;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            total_transferred as f64 / elapsed
        } else {
            0.0
        };

        reporter.progress(&format!(
            "{}: {} / {} {} @ {}",
            self.label,
            format_size(total_transferred, DECIMAL),
            format_size(self.total_bytes, DECIMAL),
            ProgressFormat::format_percent(percent as f64),
            ProgressFormat::format_speed(bytes_per_second)
        ));
    }
}

pub struct ProgressFormat;

impl ProgressFormat {
    pub fn format_speed(bytes_per_second: f64) -> String {
        format!("{}/s", format_size(bytes_per_second.max(0.0) as u64, DECIMAL))
    }

    pub fn format_percent(value: f64) -> String {
        format!("{:>3.0}%", value.clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Reporter for Lines {
        fn info(&self, _message: &str) {}
        fn warn(&self, _message: &str) {}
        fn error(&self, _message: &str) {}
        fn progress(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn test_progress_format_percent() {
        assert_eq!(ProgressFormat::format_percent(50.0), " 50%");
        assert_eq!(ProgressFormat::format_percent(100.0), "100%");
        assert_eq!(ProgressFormat::format_percent(150.0), "100%");
    }

    #[test]
    fn test_progress_format_speed() {
        assert!(ProgressFormat::format_speed(1000.0).ends_with("/s"));
        assert!(ProgressFormat::format_speed(-5.0).starts_with('0'));
    }

    #[test]
    fn test_record_bytes_accumulates_and_resets() {
        let progress = TransferProgress::new_noop();
        progress.record_bytes(10);
        progress.record_bytes(5);
        assert_eq!(progress.transferred_bytes(), 15);

        progress.reset();
        assert_eq!(progress.transferred_bytes(), 0);
    }

    #[test]
    fn test_progress_lines_are_throttled() {
        let lines = Arc::new(Lines::default());
        let progress = TransferProgress::new(lines.clone(), "data.tgz", 1000);

        for _ in 0..100 {
            progress.record_bytes(1);
        }
        progress.complete();

        let recorded = lines.0.lock().unwrap();
        // 0%, 5%, 10% buckets, then 100% and the closing newline.
        assert_eq!(recorded.len(), 5);
        assert!(recorded[0].starts_with("data.tgz:"));
        assert!(recorded[3].contains("100%"));
        assert_eq!(recorded[4], "\n");
    }
}
