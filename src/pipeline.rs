//! The artifact pipeline: compile, slice, link, optimize, execute.
//!
//! Each stage takes its input artifact(s) plus a flag list, builds the tool's
//! command line through a typed adapter, runs it, and fails fast when the
//! tool exits non-zero. Every stage creates exactly one new artifact named
//! `<input>.<stageSuffix>`; the caller owns disposal.

use std::path::{Path, PathBuf};

use crate::environment::Environment;
use crate::errors::{Error, Result};
use crate::process::{ProcessRunner, RunResult, ToolCommand};
use crate::testspec::TestSpec;

/// The assertion function is the slicing criterion for every test.
pub const SLICING_ENTRY: &str = "test_assert";

/// A filesystem path to one intermediate pipeline output. Created by a stage
/// call, consumed by the next stage or by execution, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(PathBuf);

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Deterministic derived name for a follow-up stage's output.
    pub fn derived(&self, suffix: &str) -> Artifact {
        Artifact(PathBuf::from(format!("{}.{}", self.0.display(), suffix)))
    }
}

/// One test case's pipeline, bound to an environment and a working
/// directory. All derived artifacts land in the working directory.
pub struct Pipeline<'a> {
    env: &'a Environment,
    runner: &'a ProcessRunner,
    workdir: &'a Path,
}

impl<'a> Pipeline<'a> {
    pub fn new(env: &'a Environment, runner: &'a ProcessRunner, workdir: &'a Path) -> Self {
        Self {
            env,
            runner,
            workdir,
        }
    }

    /// Compile one C source to bitcode. Rejects inputs without a `.c`
    /// suffix before touching the compiler.
    pub fn compile(&self, source: &Path, params: &[String]) -> Result<Artifact> {
        let stem = match (source.extension().and_then(|e| e.to_str()), source.file_stem()) {
            (Some("c"), Some(stem)) => stem.to_string_lossy().into_owned(),
            _ => {
                return Err(Error::NotASource {
                    path: source.to_path_buf(),
                })
            }
        };
        let output = Artifact::new(self.workdir.join(format!("{stem}.bc")));
        let cmd = CompileToBitcode {
            clang: self.env.clang(),
            support_header: self.env.support_header(),
            source,
            output: output.path(),
            params,
        }
        .command();
        self.checked(&cmd)?;
        Ok(output)
    }

    /// The stage under test: run the slicer on the primary artifact with the
    /// setup's tokens plus any test-specific extra flags.
    pub fn slice(&self, input: &Artifact, flags: &[String]) -> Result<Artifact> {
        let output = input.derived("sliced");
        let cmd = SliceModule {
            slicer: self.env.slicer(),
            entry: SLICING_ENTRY,
            flags,
            input: input.path(),
            output: output.path(),
        }
        .command();
        self.checked(&cmd)?;
        Ok(output)
    }

    /// Merge auxiliary artifacts into the primary one.
    pub fn link(&self, primary: &Artifact, auxiliaries: &[Artifact]) -> Result<Artifact> {
        let output = primary.derived("linked");
        let cmd = LinkModules {
            llvm_link: self.env.llvm_link(),
            primary: primary.path(),
            output: output.path(),
            auxiliaries,
        }
        .command();
        self.checked(&cmd)?;
        Ok(output)
    }

    /// Apply an ordered optimizer pass list.
    pub fn optimize(&self, input: &Artifact, passes: &[String]) -> Result<Artifact> {
        let output = input.derived("opt");
        let cmd = OptimizeModule {
            opt: self.env.opt(),
            input: input.path(),
            output: output.path(),
            passes,
        }
        .command();
        self.checked(&cmd)?;
        Ok(output)
    }

    /// Interpret the final artifact, capturing its output for the oracle.
    pub fn execute(&self, input: &Artifact) -> Result<RunResult> {
        let cmd = InterpretModule {
            lli: self.env.lli(),
            input: input.path(),
        }
        .command();
        self.runner.run_captured(&cmd)
    }

    /// Compile the unsliced test natively, with the support source linked in
    /// and sanitizers enabled when the toolchain has them.
    pub fn build_native(&self, spec: &TestSpec) -> Result<PathBuf> {
        let output = self.workdir.join("sanity");
        let mut extra_sources = Vec::new();
        for aux in spec.link_before.iter().chain(&spec.link_after) {
            extra_sources.push(self.env.sources_dir.join(aux));
        }
        let cmd = CompileNative {
            clang: self.env.clang(),
            support_header: self.env.support_header(),
            support_source: self.env.support_source(),
            source: self.env.sources_dir.join(&spec.source),
            extra_sources: &extra_sources,
            output: &output,
            params: &spec.compiler_params,
            sanitizers: self.env.clang_has_sanitizers,
        }
        .command();
        self.checked(&cmd)?;
        Ok(output)
    }

    /// Run a natively built binary, capturing its output. Leak detection is
    /// off: lli-interpreted runs never free either, and the oracle only
    /// cares about assertion output.
    pub fn run_native(&self, binary: &Path) -> Result<RunResult> {
        let cmd = ToolCommand::new(binary)
            .env("ASAN_OPTIONS", "detect_leaks=0")
            .env("UBSAN_OPTIONS", "print_stacktrace=1");
        self.runner.run_captured(&cmd)
    }

    fn checked(&self, cmd: &ToolCommand) -> Result<()> {
        let status = self.runner.run(cmd)?;
        if status != 0 {
            return Err(Error::ToolFailure {
                tool: cmd.tool_name(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-tool argument adapters. One small struct per external tool keeps each
// tool's argument contract in exactly one place.
// ---------------------------------------------------------------------------

struct CompileToBitcode<'a> {
    clang: PathBuf,
    support_header: PathBuf,
    source: &'a Path,
    output: &'a Path,
    params: &'a [String],
}

impl CompileToBitcode<'_> {
    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.clang)
            .arg("-include")
            .arg(self.support_header.display().to_string())
            .arg("-emit-llvm")
            .arg("-std=c11")
            .arg("-fno-strict-aliasing")
            .arg("-c")
            .arg(self.source.display().to_string())
            .arg("-o")
            .arg(self.output.display().to_string())
            .args(self.params.iter().cloned())
    }
}

struct SliceModule<'a> {
    slicer: PathBuf,
    entry: &'a str,
    flags: &'a [String],
    input: &'a Path,
    output: &'a Path,
}

impl SliceModule<'_> {
    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.slicer)
            .arg("-c")
            .arg(self.entry)
            .args(self.flags.iter().cloned())
            .arg(self.input.display().to_string())
            .arg("-o")
            .arg(self.output.display().to_string())
    }
}

struct LinkModules<'a> {
    llvm_link: PathBuf,
    primary: &'a Path,
    output: &'a Path,
    auxiliaries: &'a [Artifact],
}

impl LinkModules<'_> {
    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.llvm_link)
            .arg(self.primary.display().to_string())
            .arg("-o")
            .arg(self.output.display().to_string())
            .args(self.auxiliaries.iter().map(|a| a.path().display().to_string()))
    }
}

struct OptimizeModule<'a> {
    opt: PathBuf,
    input: &'a Path,
    output: &'a Path,
    passes: &'a [String],
}

impl OptimizeModule<'_> {
    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.opt)
            .arg(self.input.display().to_string())
            .arg("-o")
            .arg(self.output.display().to_string())
            .args(self.passes.iter().cloned())
    }
}

struct InterpretModule<'a> {
    lli: PathBuf,
    input: &'a Path,
}

impl InterpretModule<'_> {
    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.lli).arg(self.input.display().to_string())
    }
}

struct CompileNative<'a> {
    clang: PathBuf,
    support_header: PathBuf,
    support_source: PathBuf,
    source: PathBuf,
    extra_sources: &'a [PathBuf],
    output: &'a Path,
    params: &'a [String],
    sanitizers: bool,
}

impl CompileNative<'_> {
    fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.clang)
            .arg(self.source.display().to_string())
            .arg(self.support_source.display().to_string())
            .arg("-include")
            .arg(self.support_header.display().to_string())
            .arg("-std=c11")
            .arg("-fno-strict-aliasing")
            .arg("-g")
            .arg("-Werror")
            .arg("-o")
            .arg(self.output.display().to_string())
            .args(self.params.iter().cloned());
        if self.sanitizers {
            cmd = cmd
                .arg("-fsanitize=address,undefined")
                .arg("-fno-omit-frame-pointer")
                .arg("-fno-sanitize-recover=all");
        }
        cmd.args(self.extra_sources.iter().map(|s| s.display().to_string()))
    }
}
