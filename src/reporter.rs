use colored::*;
use drive_trash_cleaner::{DeletionCandidate, Error, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::{Cell, RefCell};
use std::time::Duration;

/// Console output for a cleaning run.
///
/// - Scan phase: spinner showing the trash day being scanned
/// - Candidates: one `time    name` line each, unless quiet
/// - Deletion and failures: short status lines
pub struct ConsoleReporter {
    quiet: bool,
    show_progress: bool,
    bar: RefCell<Option<ProgressBar>>,
    /// Last `YYYY-MM-DD` shown on the spinner.
    day: RefCell<String>,
    header_printed: Cell<bool>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool, show_progress: bool) -> Self {
        Self {
            quiet,
            show_progress,
            bar: RefCell::new(None),
            day: RefCell::new(String::new()),
            header_printed: Cell::new(false),
        }
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let mut guard = self.bar.borrow_mut();
        if guard.is_none() {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
            }
            pb.enable_steady_tick(Duration::from_millis(80));
            *guard = Some(pb);
        }
        guard.clone()
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }

    /// Print a line without tearing the spinner.
    fn line(&self, text: String) {
        match self.bar.borrow().as_ref() {
            Some(pb) => pb.println(text),
            None => println!("{}", text),
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_scan_progress(&self, change_time: &str) {
        let ymd = change_time.get(..10).unwrap_or(change_time);
        if ymd <= self.day.borrow().as_str() {
            return;
        }
        *self.day.borrow_mut() = ymd.to_string();
        if let Some(pb) = self.spinner() {
            pb.set_message(format!("Scanning files trashed on {}", ymd));
        }
    }

    fn on_candidate_found(&self, candidate: &DeletionCandidate) {
        if self.quiet {
            return;
        }
        if !self.header_printed.replace(true) {
            self.line(format!("{:<24}    {}", "Date trashed", "File Name/Path").bold().to_string());
        }
        self.line(format!("{}    {}", candidate.trash_time, candidate.display_name));
    }

    fn on_scan_complete(&self, _found: usize) {
        self.finish_bar();
    }

    fn on_nothing_to_delete(&self) {
        println!("No files to be deleted");
    }

    fn on_view_only(&self, count: usize, retention_days: u64) {
        let noun = if count == 1 { "file/folder" } else { "file/folder(s)" };
        println!(
            "{} {} trashed more than {} days ago",
            count.to_string().yellow(),
            noun,
            retention_days
        );
    }

    fn on_delete_start(&self, _count: usize) {
        println!("Deleting...");
    }

    fn on_delete_complete(&self, count: usize) {
        println!(
            "  {} Files successfully deleted ({})",
            "✓".green(),
            count
        );
    }

    fn on_attempt_failed(&self, _attempt: u32, error: &Error) {
        self.finish_bar();
        match error {
            Error::Authentication(_) => eprintln!("{}", "Authentication error".red()),
            other => eprintln!("{} {}", "Error:".red(), other),
        }
    }

    fn on_run_failed(&self, _error: &Error) {
        // main prints the error itself
        self.finish_bar();
    }

    fn on_run_aborted(&self, timed_out: bool) {
        self.finish_bar();
        if timed_out {
            eprintln!("{}", "Timeout: Google backend error.".red());
        }
        eprintln!("Retries unsuccessful. Abort action.");
    }
}
