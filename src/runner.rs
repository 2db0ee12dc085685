//! Per-test-case orchestration.
//!
//! [`TestCaseRunner`] drives one test case end to end: it validates the
//! declaration, creates an exclusive working directory, sanity-checks the
//! unsliced program, builds the pre-pipeline artifacts once, then runs the
//! slicing pipeline for every enabled setup (or exactly one externally
//! supplied setup), verifying each run with the oracle.
//!
//! Failure policy: a non-zero exit from any pipeline tool aborts the whole
//! run; an oracle mismatch is recorded for its setup and the matrix
//! continues. The working directory is removed on both paths, and removal is
//! idempotent even after a partial pipeline failure.

use std::fs;
use std::path::{Path, PathBuf};

use crate::environment::Environment;
use crate::errors::{Error, Result};
use crate::matrix::{default_matrix, Setup};
use crate::oracle::{self, Verdict};
use crate::pipeline::{Artifact, Pipeline};
use crate::process::ProcessRunner;
use crate::report::Reporter;
use crate::testspec::TestSpec;

/// Aggregate outcome of one runner invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Exit 0 only when every enabled setup passed. An empty matrix after
    /// filtering counts as success.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

pub struct TestCaseRunner<'a> {
    env: &'a Environment,
    reporter: Reporter,
    name: String,
    spec: TestSpec,
    workdir: PathBuf,
}

impl<'a> TestCaseRunner<'a> {
    pub fn new(env: &'a Environment, name: impl Into<String>, spec: TestSpec) -> Self {
        let name = name.into();
        let workdir = env.work_root.join(&name);
        Self {
            env,
            reporter: Reporter::new(env.debug),
            name,
            spec,
            workdir,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run the test case. `explicit` bypasses matrix enumeration and runs
    /// exactly that one setup. Cleanup runs on success and on failure.
    pub fn run(&self, explicit: Option<Setup>) -> Result<RunSummary> {
        self.spec.validate(&self.name)?;
        self.prepare_workdir()?;
        let outcome = self.run_inner(explicit);
        self.cleanup();
        let summary = outcome?;
        self.reporter.summary(&self.name, &summary);
        Ok(summary)
    }

    fn run_inner(&self, explicit: Option<Setup>) -> Result<RunSummary> {
        let runner = ProcessRunner::new(self.env.debug);
        let pipeline = Pipeline::new(self.env, &runner, &self.workdir);

        self.sanity_check(&pipeline)?;
        let (primary, post_links) = self.build_prelude(&pipeline)?;

        let mut summary = RunSummary::default();
        match explicit {
            Some(setup) => {
                self.run_setup(&pipeline, &primary, &post_links, &setup, &mut summary)?;
            }
            None => {
                for setup in default_matrix(self.env).setups() {
                    if !self.spec.enabled_in(&setup) {
                        self.reporter.skip(&setup);
                        summary.skipped += 1;
                        continue;
                    }
                    self.run_setup(&pipeline, &primary, &post_links, &setup, &mut summary)?;
                }
            }
        }
        Ok(summary)
    }

    /// Compile the primary source and every auxiliary, apply pre-slicing
    /// optimization and linking, and compile the assertion-support module
    /// that is always linked in after slicing.
    fn build_prelude(&self, pipeline: &Pipeline) -> Result<(Artifact, Vec<Artifact>)> {
        let source = self.env.sources_dir.join(&self.spec.source);
        let mut primary = pipeline.compile(&source, &self.spec.compiler_params)?;

        if !self.spec.opt_before.is_empty() {
            primary = pipeline.optimize(&primary, &self.spec.opt_before)?;
        }

        let mut pre_links = Vec::new();
        for aux in &self.spec.link_before {
            let path = self.env.sources_dir.join(aux);
            pre_links.push(pipeline.compile(&path, &self.spec.compiler_params)?);
        }
        if !pre_links.is_empty() {
            primary = pipeline.link(&primary, &pre_links)?;
        }

        let mut post_links = Vec::new();
        for aux in &self.spec.link_after {
            let path = self.env.sources_dir.join(aux);
            post_links.push(pipeline.compile(&path, &self.spec.compiler_params)?);
        }
        post_links.push(pipeline.compile(&self.env.support_source(), &self.spec.compiler_params)?);

        Ok((primary, post_links))
    }

    /// One matrix point: slice, re-link the support artifacts, optionally
    /// post-optimize, execute and verify. Intermediates are disposed of here
    /// once the verdict is in.
    fn run_setup(
        &self,
        pipeline: &Pipeline,
        primary: &Artifact,
        post_links: &[Artifact],
        setup: &Setup,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.reporter.progress(setup);

        let mut flags: Vec<String> = setup.tokens().to_vec();
        flags.extend(self.spec.add_params.iter().cloned());

        let sliced = pipeline.slice(primary, &flags)?;
        let linked = pipeline.link(&sliced, post_links)?;
        let executable = if self.spec.opt_after.is_empty() {
            linked.clone()
        } else {
            pipeline.optimize(&linked, &self.spec.opt_after)?
        };

        let run = pipeline.execute(&executable)?;
        self.reporter.dump_run(&run);

        let verdict = oracle::verify(&run, self.expected_ref().as_deref())?;
        match verdict {
            Verdict::Pass => {
                self.reporter.pass();
                summary.passed += 1;
            }
            Verdict::Fail(reason) => {
                self.reporter.fail(&reason);
                summary.failed += 1;
            }
        }

        self.dispose(&[sliced, linked, executable]);
        Ok(())
    }

    /// Compile and run the unsliced program natively; its output must
    /// already satisfy the oracle before slicing is worth testing.
    fn sanity_check(&self, pipeline: &Pipeline) -> Result<()> {
        let binary = pipeline.build_native(&self.spec)?;
        let run = pipeline.run_native(&binary)?;
        self.reporter.dump_run(&run);
        match oracle::verify(&run, self.expected_ref().as_deref())? {
            Verdict::Pass => Ok(()),
            Verdict::Fail(reason) => Err(Error::Sanity {
                reason: reason.to_string(),
            }),
        }
    }

    fn expected_ref(&self) -> Option<PathBuf> {
        self.spec
            .expected_output
            .as_ref()
            .map(|name| self.env.sources_dir.join(name))
    }

    fn prepare_workdir(&self) -> Result<()> {
        // Stale directories from an interrupted earlier run are fair game.
        let _ = fs::remove_dir_all(&self.workdir);
        fs::create_dir_all(&self.workdir).map_err(|source| Error::Io {
            path: self.workdir.clone(),
            source,
        })
    }

    /// Remove per-setup intermediates so sequential setups never observe
    /// each other's artifacts. Missing files are fine; a later stage may
    /// share a path with an earlier one when no pass was configured.
    fn dispose(&self, artifacts: &[Artifact]) {
        for artifact in artifacts {
            let _ = fs::remove_file(artifact.path());
        }
    }

    /// Idempotent, safe after partial pipeline failure.
    fn cleanup(&self) {
        let _ = fs::remove_dir_all(&self.workdir);
    }
}
