//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use migcheck_core::progress::{BatchProgress, EntryStatus, BATCH_COMPLETE};
use std::time::Duration;

/// Progress bar for a batch export, one tick per entry
#[derive(Debug)]
pub struct BatchProgressBar {
    pb: ProgressBar,
}

impl BatchProgressBar {
    pub fn new(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress template")
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn abandon(&self, message: &str) {
        self.pb.abandon_with_message(message.to_string());
    }
}

impl BatchProgress for BatchProgressBar {
    fn on_progress(&self, current: usize, total: usize, label: &str) {
        self.pb.set_length(total as u64);
        self.pb.set_position(current as u64);
        if label == BATCH_COMPLETE {
            self.pb.finish_with_message("done");
        } else {
            self.pb.set_message(format!("Exporting {label}"));
        }
    }

    fn on_entry_finished(&self, _index: usize, key: &str, status: &EntryStatus) {
        if let EntryStatus::Failed { reason } = status {
            self.pb.println(format!("❌ {key}: {reason}"));
        }
    }
}

/// Create a spinner progress bar
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
