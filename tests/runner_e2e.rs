// End-to-end runner scenarios against stub pipeline tools.
//
// Each fixture builds an isolated tool directory of shell-script stand-ins
// for clang/llvm-slicer/llvm-link/opt/lli, plus a sources tree, and points
// an Environment at it. The stubs append their invocations to a log so the
// tests can assert how far the pipeline got.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;

use slicetest::environment::Environment;
use slicetest::matrix::Setup;
use slicetest::runner::TestCaseRunner;
use slicetest::testspec::TestSpec;
use slicetest::Error;

struct Fixture {
    _dir: tempfile::TempDir,
    env: Environment,
    log: PathBuf,
    sources: PathBuf,
}

/// Shell body shared by every artifact-producing stub: log the invocation,
/// then write the `-o` target.
const PRODUCE_OUTPUT: &str = r#"
out=""; prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
echo module > "$out"
"#;

impl Fixture {
    fn new() -> Self {
        Self::build("Assertion PASSED", "Assertion PASSED", false)
    }

    /// `native_line` is printed by binaries the clang stub "compiles";
    /// `lli_line` by the interpreter stub; `slicer_fails` makes the slicer
    /// exit non-zero.
    fn build(native_line: &str, lli_line: &str, slicer_fails: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let sources = dir.path().join("sources");
        let work = dir.path().join("work");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(&sources).unwrap();
        fs::create_dir_all(&work).unwrap();

        let log = dir.path().join("tools.log");

        write_tool(
            &bin,
            "clang",
            &format!(
                r#"#!/bin/sh
echo "clang $@" >> {log}
out=""; prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
printf '#!/bin/sh\necho "{native}"\n' > "$out"
chmod +x "$out"
"#,
                log = log.display(),
                native = native_line,
            ),
        );
        write_tool(
            &bin,
            "llvm-slicer",
            &format!(
                "#!/bin/sh\necho \"llvm-slicer $@\" >> {log}\n{fail}{body}",
                log = log.display(),
                fail = if slicer_fails { "exit 1\n" } else { "" },
                body = PRODUCE_OUTPUT,
            ),
        );
        for tool in ["llvm-link", "opt"] {
            write_tool(
                &bin,
                tool,
                &format!(
                    "#!/bin/sh\necho \"{tool} $@\" >> {log}\n{body}",
                    tool = tool,
                    log = log.display(),
                    body = PRODUCE_OUTPUT,
                ),
            );
        }
        write_tool(
            &bin,
            "lli",
            &format!(
                "#!/bin/sh\necho \"lli $@\" >> {log}\necho \"{line}\"\n",
                log = log.display(),
                line = lli_line,
            ),
        );

        fs::write(sources.join("probe.c"), "int main(void) { return 0; }\n").unwrap();
        fs::write(dir.path().join("test_assert.c"), "/* support */\n").unwrap();
        fs::write(dir.path().join("test_assert.h"), "/* support */\n").unwrap();

        let env = Environment {
            tools_dir: bin.clone(),
            sources_dir: sources.clone(),
            llvm_tools_dir: bin.clone(),
            compiler: bin.join("clang"),
            work_root: work,
            have_svf: false,
            clang_has_sanitizers: false,
            debug: false,
        };

        Self {
            _dir: dir,
            env,
            log,
            sources,
        }
    }

    fn spec(&self) -> TestSpec {
        TestSpec {
            source: "probe.c".into(),
            ..TestSpec::default()
        }
    }

    fn tool_invocations(&self, tool: &str) -> usize {
        match fs::read_to_string(&self.log) {
            Ok(text) => text
                .lines()
                .filter(|l| l.starts_with(&format!("{tool} ")))
                .count(),
            Err(_) => 0,
        }
    }
}

fn write_tool(bin: &Path, name: &str, body: &str) {
    let path = bin.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn full_matrix_skips_disabled_setups_and_passes_the_rest() {
    let fixture = Fixture::new();
    let spec = TestSpec {
        required_params: vec!["-pta=fs".into()],
        ..fixture.spec()
    };
    let runner = TestCaseRunner::new(&fixture.env, "probe", spec);
    let summary = runner.run(None).unwrap();

    assert_eq!(summary.passed, 2);
    assert_eq!(summary.skipped, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.exit_code(), 0);
    // Only the enabled setups ever reached the slicer.
    assert_eq!(fixture.tool_invocations("llvm-slicer"), 2);
    assert!(!runner.workdir().exists());
}

#[test]
fn reference_oracle_passes_end_to_end() {
    let fixture = Fixture::new();
    fs::write(fixture.sources.join("probe.expected"), "Assertion PASSED\n").unwrap();
    let spec = TestSpec {
        expected_output: Some("probe.expected".into()),
        ..fixture.spec()
    };
    let summary = TestCaseRunner::new(&fixture.env, "probe", spec)
        .run(None)
        .unwrap();
    assert_eq!(summary.passed, 6);
    assert_eq!(summary.failed, 0);
}

#[test]
fn oracle_mismatch_is_recorded_and_the_matrix_continues() {
    let fixture = Fixture::build("Assertion PASSED", "Assertion FAILED", false);
    let summary = TestCaseRunner::new(&fixture.env, "probe", fixture.spec())
        .run(None)
        .unwrap();

    assert_eq!(summary.failed, 6);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.exit_code(), 1);
    // Every setup still ran; mismatches do not abort the run.
    assert_eq!(fixture.tool_invocations("llvm-slicer"), 6);
}

#[test]
fn tool_failure_aborts_the_run_but_still_cleans_up() {
    let fixture = Fixture::build("Assertion PASSED", "Assertion PASSED", true);
    let runner = TestCaseRunner::new(&fixture.env, "probe", fixture.spec());
    match runner.run(None) {
        Err(Error::ToolFailure { tool }) => assert_eq!(tool, "llvm-slicer"),
        other => panic!("expected a tool failure, got {other:?}"),
    }
    // Aborted on the first setup, no continuation.
    assert_eq!(fixture.tool_invocations("llvm-slicer"), 1);
    assert!(!runner.workdir().exists());
}

#[test]
fn explicit_setup_bypasses_matrix_enumeration() {
    let fixture = Fixture::new();
    let runner = TestCaseRunner::new(&fixture.env, "probe", fixture.spec());
    let setup = Setup::from_tokens(["-pta=inv", "-cd-alg=classic"]);
    let summary = runner.run(Some(setup)).unwrap();

    assert_eq!(summary.passed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(fixture.tool_invocations("llvm-slicer"), 1);
    let log = fs::read_to_string(&fixture.log).unwrap();
    assert!(log.contains("-pta=inv"));
    assert!(log.contains("-cd-alg=classic"));
}

#[test]
fn sanity_check_failure_is_fatal_before_any_slicing() {
    let fixture = Fixture::build("Assertion FAILED", "Assertion PASSED", false);
    let runner = TestCaseRunner::new(&fixture.env, "probe", fixture.spec());
    assert!(matches!(runner.run(None), Err(Error::Sanity { .. })));
    assert_eq!(fixture.tool_invocations("llvm-slicer"), 0);
    assert!(!runner.workdir().exists());
}

#[test]
fn conflicting_post_stages_never_touch_the_filesystem() {
    let fixture = Fixture::new();
    let spec = TestSpec {
        opt_after: vec!["-mem2reg".into()],
        link_after: vec!["aux.c".into()],
        ..fixture.spec()
    };
    let runner = TestCaseRunner::new(&fixture.env, "probe", spec);
    assert!(matches!(
        runner.run(None),
        Err(Error::ConflictingPostStages { .. })
    ));
    assert!(!runner.workdir().exists());
    assert_eq!(fixture.tool_invocations("clang"), 0);
}

#[test]
fn pre_pipeline_optimizes_and_links_before_slicing() {
    let fixture = Fixture::new();
    fs::write(fixture.sources.join("helper.c"), "void helper(void) {}\n").unwrap();
    let spec = TestSpec {
        opt_before: vec!["-mem2reg".into()],
        link_before: vec!["helper.c".into()],
        ..fixture.spec()
    };
    let summary = TestCaseRunner::new(&fixture.env, "probe", spec)
        .run(Some(Setup::from_tokens(["-pta=fi", "-cd-alg=ntscd"])))
        .unwrap();
    assert_eq!(summary.passed, 1);

    let log = fs::read_to_string(&fixture.log).unwrap();
    // The primary artifact is optimized before any linking.
    let opt_line = log
        .lines()
        .find(|l| l.starts_with("opt "))
        .expect("opt was never invoked");
    assert!(opt_line.contains("probe.bc "));
    assert!(opt_line.contains("-mem2reg"));
    // The auxiliary is merged in, and only then does the slicer run.
    let positions: Vec<usize> = ["opt ", "llvm-link ", "llvm-slicer "]
        .iter()
        .map(|tool| log.find(*tool).unwrap_or_else(|| panic!("{tool} missing")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(log.contains("helper.c"));
}

#[test]
fn post_optimize_runs_between_link_and_execute() {
    let fixture = Fixture::new();
    let spec = TestSpec {
        opt_after: vec!["-mem2reg".into()],
        ..fixture.spec()
    };
    let summary = TestCaseRunner::new(&fixture.env, "probe", spec)
        .run(Some(Setup::from_tokens(["-pta=fi", "-cd-alg=ntscd"])))
        .unwrap();
    assert_eq!(summary.passed, 1);
    let log = fs::read_to_string(&fixture.log).unwrap();
    assert!(log.contains("opt ") && log.contains("-mem2reg"));
    let positions: Vec<usize> = ["llvm-slicer ", "llvm-link ", "opt ", "lli "]
        .iter()
        .map(|tool| log.find(*tool).unwrap_or_else(|| panic!("{tool} missing")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

// --- binary surfaces -------------------------------------------------------

#[test]
fn unknown_test_name_exits_one() {
    Command::cargo_bin("slicetest")
        .unwrap()
        .arg("definitely-not-a-test")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("unknown test name"));
}

#[test]
fn classify_labels_timeouts_with_the_bare_phase() {
    Command::cargo_bin("classify")
        .unwrap()
        .args(["llvm-slicer", "timeout"])
        .write_stdin("> clang probe.c\n> opt probe.bc\nllvm-slicer probe.bc\n")
        .assert()
        .success()
        .stdout("llvm-slicer\n");
}

#[test]
fn classify_labels_clean_and_unclean_exits() {
    Command::cargo_bin("classify")
        .unwrap()
        .args(["llvm-slicer", "0"])
        .write_stdin("> clang probe.c\n")
        .assert()
        .success()
        .stdout("done\n");

    Command::cargo_bin("classify")
        .unwrap()
        .args(["llvm-slicer", "1"])
        .write_stdin("> clang probe.c\n> opt probe.bc\n")
        .assert()
        .success()
        .stdout("error(opt)\n");
}
