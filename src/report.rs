//! Console reporting for the runner.
//!
//! One progress line per setup, a colored verdict, diffs on reference
//! mismatches, and a final summary. Colors are enabled only on a terminal.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::matrix::Setup;
use crate::oracle::FailReason;
use crate::process::RunResult;
use crate::runner::RunSummary;

pub struct Reporter {
    choice: ColorChoice,
    debug: bool,
}

impl Reporter {
    pub fn new(debug: bool) -> Self {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self { choice, debug }
    }

    pub fn skip(&self, setup: &Setup) {
        println!("Skipping setup {}", setup);
    }

    pub fn progress(&self, setup: &Setup) {
        if self.debug {
            println!("Executing setup: {} ...", setup);
        } else {
            print!("Executing setup: {} ... ", setup);
            let _ = std::io::stdout().flush();
        }
    }

    pub fn pass(&self) {
        let mut stdout = StandardStream::stdout(self.choice);
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(stdout, "OK!");
        let _ = stdout.reset();
        println!();
    }

    pub fn fail(&self, reason: &FailReason) {
        let mut stderr = StandardStream::stderr(self.choice);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(stderr, "FAIL");
        let _ = stderr.reset();
        let _ = writeln!(stderr, ": {}", reason);
        // Expected/actual detail only in debug mode; the one-line reason is
        // always printed.
        if self.debug {
            if let FailReason::OutputMismatch { expected, actual } = reason {
                self.diff(expected, actual);
            }
        }
        println!();
    }

    /// Line diff of expected vs. actual, reference lines green, captured
    /// lines red.
    pub fn diff(&self, expected: &[String], actual: &[String]) {
        let mut stderr = StandardStream::stderr(self.choice);
        let changeset = Changeset::new(&expected.join("\n"), &actual.join("\n"), "\n");
        for diff in &changeset.diffs {
            match diff {
                Difference::Same(x) => {
                    let _ = stderr.reset();
                    let _ = writeln!(stderr, " {}", x);
                }
                Difference::Rem(x) => {
                    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                    let _ = writeln!(stderr, "-{}", x);
                }
                Difference::Add(x) => {
                    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                    let _ = writeln!(stderr, "+{}", x);
                }
            }
        }
        let _ = stderr.reset();
    }

    /// Debug dump of a captured run.
    pub fn dump_run(&self, run: &RunResult) {
        if !self.debug {
            return;
        }
        println!("--- stdout ---");
        print!("{}", run.stdout_text());
        println!("--- stderr ---");
        print!("{}", run.stderr_text());
        println!("--- exitcode {:?} ---", run.status);
    }

    pub fn summary(&self, name: &str, summary: &RunSummary) {
        let mut stdout = StandardStream::stdout(self.choice);
        let _ = write!(stdout, "{}: ", name);
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
        let _ = write!(stdout, "{} passed", summary.passed);
        let _ = stdout.reset();
        let _ = write!(stdout, ", ");
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = write!(stdout, "{} failed", summary.failed);
        let _ = stdout.reset();
        let _ = writeln!(stdout, ", {} skipped", summary.skipped);
    }
}
