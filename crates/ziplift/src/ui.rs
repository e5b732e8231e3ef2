use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use ziplift_archive::{ArchiveReport, ExtractProgress};
use ziplift_upload::Progress;

const BAR_STYLE: &str =
    "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {wide_msg}";

const SPINNER_STYLE: &str = "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static BAR_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| template(BAR_STYLE));

static SPINNER_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| template(SPINNER_STYLE));

fn template(style: &str) -> Option<ProgressStyle> {
    let pb_style = match ProgressStyle::with_template(style) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
}

fn styled(pb: ProgressBar, style: &Lazy<Option<ProgressStyle>>) -> ProgressBar {
    match style.as_ref() {
        Some(style) => pb.with_style(style.clone()),
        None => pb,
    }
}

pub fn upload_message(
    percentage: f64,
    uploaded: u64,
    total: u64,
    path: &Path,
    elapsed: Duration,
) -> String {
    format!(
        "Uploading: {percentage:.2}% ({uploaded}/{total}) - {} - Time: {elapsed:?}",
        path.display()
    )
}

/// Spinner shown while an archive is extracted.
pub struct ExtractTracker {
    pb: ProgressBar,
}

impl ExtractTracker {
    pub fn new(archive: &Path) -> Self {
        let pb = styled(ProgressBar::new_spinner(), &SPINNER_TEMPLATE);
        pb.set_prefix("Extracting");
        pb.set_message(archive.display().to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    pub fn observe(&self, progress: &ExtractProgress) {
        self.pb.set_message(format!(
            "{} entries, {} - {}",
            progress.entries,
            HumanBytes(progress.bytes),
            progress.current.display()
        ));
    }

    pub fn finish(&self, report: &ArchiveReport) {
        self.pb.finish_with_message(format!(
            "{} entries, {} ({} nested archives, {} skipped)",
            report.entry_count(),
            HumanBytes(report.total_bytes),
            report.nested_archives.len(),
            report.skipped
        ));
    }

    pub fn abandon(&self) {
        self.pb.abandon();
    }
}

/// One bar per directory upload. The bar's length follows the running
/// file total, so it grows while the walk discovers files.
pub struct UploadTracker {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, event: &Progress) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };

        match event {
            Progress::Started { directory } => {
                let pb = styled(self.multi.add(ProgressBar::new(0)), &BAR_TEMPLATE);
                pb.set_prefix("Uploading");
                pb.set_message(directory.display().to_string());
                bars.insert(directory.clone(), pb);
            }
            Progress::FileUploaded {
                directory,
                path,
                uploaded,
                total,
                percentage,
                elapsed,
                ..
            } => {
                if let Some(pb) = bars.get(directory) {
                    pb.set_length(*total);
                    pb.set_position(*uploaded);
                    pb.set_message(upload_message(*percentage, *uploaded, *total, path, *elapsed));
                }
            }
            Progress::Finished {
                directory, elapsed, ..
            } => {
                if let Some(pb) = bars.remove(directory) {
                    pb.finish_with_message(format!("Uploaded directory {}", directory.display()));
                }
                let _ = self
                    .multi
                    .println(format!("Total upload time: {elapsed:?}"));
            }
        }
    }

    /// Stop the bars of uploads that never finished.
    pub fn abandon_remaining(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                pb.abandon();
            }
        }
    }
}
