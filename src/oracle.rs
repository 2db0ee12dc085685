//! Output verification.
//!
//! Two oracle policies turn a captured run into a [`Verdict`]:
//!
//! - With a reference file, stdout is compared line by line against the
//!   reference, order-sensitive, after stripping each line and dropping
//!   empty ones on both sides.
//! - Without one, stdout is scanned for the literal assertion markers. The
//!   run passes only if `Assertion PASSED` appears and `Assertion FAILED`
//!   does not; marker presence matters, position does not.
//!
//! A non-zero exit status of the executed program is a hard failure before
//! either policy applies.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};
use crate::process::RunResult;

pub const ASSERT_PASSED: &str = "Assertion PASSED";
pub const ASSERT_FAILED: &str = "Assertion FAILED";

/// Pass/fail outcome of one executed setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(FailReason),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Why a setup failed. `OutputMismatch` keeps both line sequences so the
/// reporter can render a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    ExitStatus(Option<i32>),
    AssertionNotCalled,
    AssertionFailed,
    OutputMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::ExitStatus(Some(code)) => {
                write!(f, "executing the code failed (exit status {code})")
            }
            FailReason::ExitStatus(None) => {
                write!(f, "executing the code failed (killed by signal)")
            }
            FailReason::AssertionNotCalled => write!(f, "assertion was not called"),
            FailReason::AssertionFailed => write!(f, "assertion failed"),
            FailReason::OutputMismatch { .. } => write!(f, "the output is not as expected"),
        }
    }
}

/// Strip every line and drop the empty ones; both the captured output and
/// the reference go through this before comparison.
pub fn normalized_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Verify one run. `expected_ref` selects the reference-file policy; absence
/// selects the default marker policy.
pub fn verify(run: &RunResult, expected_ref: Option<&Path>) -> Result<Verdict> {
    if !run.success() {
        return Ok(Verdict::Fail(FailReason::ExitStatus(run.status)));
    }
    let actual = normalized_lines(&run.stdout_text());
    match expected_ref {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(verify_against_reference(&actual, &normalized_lines(&text)))
        }
        None => Ok(default_verdict(&actual)),
    }
}

/// Exact, order-sensitive comparison of normalized line sequences.
pub fn verify_against_reference(actual: &[String], expected: &[String]) -> Verdict {
    if actual == expected {
        Verdict::Pass
    } else {
        Verdict::Fail(FailReason::OutputMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// The default marker-scan policy.
pub fn default_verdict(lines: &[String]) -> Verdict {
    let mut passed = false;
    let mut failed = false;
    for line in lines {
        if line == ASSERT_PASSED {
            passed = true;
        } else if line == ASSERT_FAILED {
            failed = true;
        }
    }
    if !passed && !failed {
        Verdict::Fail(FailReason::AssertionNotCalled)
    } else if failed || !passed {
        Verdict::Fail(FailReason::AssertionFailed)
    } else {
        Verdict::Pass
    }
}
