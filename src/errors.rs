//! Unified error type for the slicing test runner.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! one-to-one onto the failure modes of a run: an unknown test name, a
//! malformed test declaration, an external tool that could not be spawned or
//! exited non-zero, and I/O on reference files and working directories.
//!
//! Oracle mismatches are deliberately *not* errors: they are verdicts
//! (see [`crate::oracle::Verdict`]) so that the matrix loop can record them
//! and continue. The only exception is the sanity check, whose mismatch is
//! fatal before any slicing starts.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("unknown test name: '{name}'")]
    #[diagnostic(
        code(slicetest::unknown_test),
        help("run with a test name declared in the registry (tests.yaml or built-in)")
    )]
    UnknownTest { name: String },

    #[error("input is not a .c source code: {}", path.display())]
    #[diagnostic(code(slicetest::not_a_source))]
    NotASource { path: PathBuf },

    #[error("test '{test}' configures both post-optimize and post-link")]
    #[diagnostic(
        code(slicetest::conflicting_post_stages),
        help("the pipeline supports at most one of opt_after and link_after per test")
    )]
    ConflictingPostStages { test: String },

    #[error("failed executing {tool}")]
    #[diagnostic(
        code(slicetest::tool_failure),
        help("set SLICETEST_DEBUG=1 to see the tool's command line and output")
    )]
    ToolFailure { tool: String },

    #[error("cannot execute {tool}")]
    #[diagnostic(code(slicetest::spawn_failure))]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot access {}", path.display())]
    #[diagnostic(code(slicetest::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test registry {}", path.display())]
    #[diagnostic(code(slicetest::registry))]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("sanity check failed: {reason}")]
    #[diagnostic(
        code(slicetest::sanity),
        help("the unsliced program must already produce the expected output")
    )]
    Sanity { reason: String },
}

impl Error {
    /// Process exit code mandated for this error. All fatal errors exit 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
