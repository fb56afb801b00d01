use std::fmt;
use std::time::Duration;
use serde::Serialize;

use crate::core::{ImageItem, ItemStatus, percent_saved};

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of items in the batch
    pub total_items: usize,
    /// Items that reached `done`
    pub completed: usize,
    /// Items that reached `error`
    pub failed: usize,
    /// Original bytes across the completed items
    pub original_bytes: u64,
    /// Output bytes across the completed items
    pub compressed_bytes: u64,
    /// Overall savings across completed items, same formula as per item
    pub percent_saved: i64,
    /// Wall-clock time for the run in milliseconds
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub fn from_items(items: &[ImageItem], elapsed: Duration) -> Self {
        let mut summary = Self {
            total_items: items.len(),
            elapsed_ms: elapsed.as_millis() as u64,
            ..Self::default()
        };

        for item in items {
            match item.status() {
                ItemStatus::Done(output) => {
                    summary.completed += 1;
                    summary.original_bytes += item.original_size;
                    summary.compressed_bytes += output.compressed_size;
                }
                ItemStatus::Error { .. } => summary.failed += 1,
                _ => {}
            }
        }

        summary.percent_saved = percent_saved(summary.original_bytes, summary.compressed_bytes);
        summary
    }

    /// Progress percentage (0-100) of terminal items.
    pub fn progress_percentage(&self) -> usize {
        if self.total_items > 0 {
            ((self.completed + self.failed) * 100) / self.total_items
        } else {
            0
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} compressed, {} failed, {} → {} ({}% saved) in {:.2}s",
            self.completed,
            self.total_items,
            self.failed,
            format_bytes(self.original_bytes),
            format_bytes(self.compressed_bytes),
            self.percent_saved,
            self.elapsed_ms as f64 / 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompressedOutput;

    #[test]
    fn summarizes_mixed_outcomes() {
        let mut done = ImageItem::from_bytes("a.png", vec![0u8; 1000]);
        done.mark_processing().unwrap();
        done.mark_done(CompressedOutput::new("a.jpg".into(), vec![0u8; 250], 1000)).unwrap();

        let mut failed = ImageItem::from_bytes("b.png", vec![0u8; 500]);
        failed.mark_processing().unwrap();
        failed.mark_failed("bad").unwrap();

        let pending = ImageItem::from_bytes("c.png", vec![0u8; 10]);

        let summary = BatchSummary::from_items(&[done, failed, pending], Duration::from_millis(1500));
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.original_bytes, 1000);
        assert_eq!(summary.compressed_bytes, 250);
        assert_eq!(summary.percent_saved, 75);
        assert_eq!(summary.progress_percentage(), 66);
        assert_eq!(summary.elapsed_ms, 1500);
    }
}
