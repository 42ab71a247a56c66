use crate::ui::icons::{CHECK, CROSS, LINK, STEP, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Terminal status output for a deployment run.
///
/// Each orchestration step prints one `[*]` line. Long-running steps (build,
/// database sync) get a spinner that is replaced by an ok/error line.
pub struct DeployUI {
    multi: MultiProgress,
    verbose: bool,
}

impl DeployUI {
    pub fn new(verbose: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            verbose,
        }
    }

    /// A UI that draws nothing. Used by tests and non-interactive callers.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            verbose: false,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn step(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", STEP, msg.as_ref()));
    }

    pub fn detail(&self, msg: impl AsRef<str>) {
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg.as_ref()).dim()));
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", WARN, style(msg.as_ref()).yellow()));
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", CHECK, style(msg.as_ref()).green()));
    }

    pub fn failure(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", CROSS, style(msg.as_ref()).red()));
    }

    pub fn site_ready(&self, url: &str) {
        self.print_line(format!(
            "{}Site available at {}",
            LINK,
            style(url).cyan().underlined()
        ));
    }

    /// Start a spinner for a long-running step.
    pub fn spinner(&self, msg: impl Into<String>) -> StepSpinner {
        let msg = msg.into();
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("progress bar template is a valid static string"),
        );
        bar.set_message(msg.clone());
        bar.enable_steady_tick(Duration::from_millis(100));
        StepSpinner {
            bar,
            msg,
            started: Instant::now(),
        }
    }
}

/// A running spinner. Dropping it without finishing clears it.
pub struct StepSpinner {
    bar: ProgressBar,
    msg: String,
    started: Instant,
}

impl StepSpinner {
    pub fn finish_ok(self) {
        let elapsed = self.started.elapsed().as_secs();
        self.bar.finish_with_message(format!(
            "{}{} {}",
            CHECK,
            self.msg,
            style(format!("({}s)", elapsed)).dim()
        ));
    }

    pub fn finish_err(self, reason: &str) {
        self.bar.finish_with_message(format!(
            "{}{} {}",
            CROSS,
            self.msg,
            style(reason).red()
        ));
    }
}

impl Drop for StepSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
