//! The slicetest command-line interface.
//!
//! The surface is positional only: a test name, then optionally the tokens
//! of one explicit setup. No tokens runs the full enabled matrix.

use clap::Parser;

use crate::environment::Environment;
use crate::matrix::Setup;
use crate::runner::TestCaseRunner;
use crate::testspec::TestRegistry;
use crate::Result;

#[derive(Debug, Parser)]
#[command(
    name = "slicetest",
    version,
    about = "Run one slicing test across the analysis configuration matrix."
)]
pub struct Args {
    /// Name of the test to run.
    pub test: String,

    /// Explicit setup tokens (e.g. `-pta=fi -cd-alg=ntscd`); when present,
    /// exactly this one setup runs and matrix enumeration is skipped.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub setup: Vec<String>,
}

/// Entry point for the runner binary; returns the process exit code.
pub fn run() -> i32 {
    let args = Args::parse();
    let env = Environment::acquire();
    match execute(&args, env) {
        Ok(code) => code,
        Err(error) => {
            let code = error.exit_code();
            eprintln!("{:?}", miette::Report::new(error));
            code
        }
    }
}

fn execute(args: &Args, env: &Environment) -> Result<i32> {
    let registry = TestRegistry::discover(env)?;
    let spec = registry.get(&args.test)?.clone();
    let runner = TestCaseRunner::new(env, &args.test, spec);
    let explicit = if args.setup.is_empty() {
        None
    } else {
        Some(Setup::from_tokens(args.setup.iter().cloned()))
    };
    let summary = runner.run(explicit)?;
    Ok(summary.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_tokens_may_start_with_hyphens() {
        let args = Args::parse_from(["slicetest", "basic-assert", "-pta=fi", "-cd-alg=ntscd"]);
        assert_eq!(args.test, "basic-assert");
        assert_eq!(args.setup, ["-pta=fi", "-cd-alg=ntscd"]);
    }

    #[test]
    fn bare_test_name_selects_the_full_matrix() {
        let args = Args::parse_from(["slicetest", "basic-assert"]);
        assert!(args.setup.is_empty());
    }
}
