//! Execution-environment discovery.
//!
//! The runner locates the slicer tools, the LLVM toolchain and the test
//! sources from the build system's cache file when one is present, and falls
//! back to treating the invoking binary's directory as the source layout when
//! it is not. Discovery happens exactly once per process invocation (see
//! [`Environment::acquire`]); the result is an immutable value passed
//! explicitly to every component that needs tool paths or axis extensions.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

/// Default location of the build cache, relative to the directory the runner
/// is normally invoked from (the slicing test directory of a build tree).
pub const DEFAULT_CACHE: &str = "../../CMakeCache.txt";

const SVF_KEY: &str = "SVF_DIR";
const SANITIZERS_KEY: &str = "CLANG_HAS_SANITIZERS";
const SOURCE_ROOT_KEY: &str = "dg_SOURCE_DIR";
const BINARY_ROOT_KEY: &str = "dg_BINARY_DIR";
const LLVM_TOOLS_KEY: &str = "LLVM_TOOLS_DIR";
const COMPILER_KEY: &str = "CMAKE_C_COMPILER";

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

/// Immutable snapshot of everything the pipeline needs to know about the
/// machine it runs on.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Directory holding the slicer binaries under test.
    pub tools_dir: PathBuf,
    /// Directory holding the test's C sources and expected-output files.
    pub sources_dir: PathBuf,
    /// Directory holding clang/llvm-link/opt/lli; empty means "use PATH".
    pub llvm_tools_dir: PathBuf,
    /// The compiler driver. Defaults to clang from `llvm_tools_dir`.
    pub compiler: PathBuf,
    /// Directory under which per-test working directories are created.
    pub work_root: PathBuf,
    /// Whether the optional SVF points-to backend was found at build time.
    pub have_svf: bool,
    /// Whether the toolchain supports address/undefined sanitizers.
    pub clang_has_sanitizers: bool,
    /// Echo tool command lines and pass their output through.
    pub debug: bool,
}

/// Values recognized in the build cache; everything else is ignored.
#[derive(Debug, Default, PartialEq)]
struct CacheValues {
    source_root: Option<PathBuf>,
    binary_root: Option<PathBuf>,
    llvm_tools: Option<PathBuf>,
    compiler: Option<PathBuf>,
    have_svf: bool,
    sanitizers: bool,
}

impl Environment {
    /// The process-wide environment, discovered on first use from
    /// [`DEFAULT_CACHE`] and reused afterwards.
    pub fn acquire() -> &'static Environment {
        ENVIRONMENT.get_or_init(|| Environment::discover(Some(Path::new(DEFAULT_CACHE))))
    }

    /// Resolve the environment, preferring the build cache at `cache` and
    /// falling back to the invoking binary's own directory. A missing or
    /// unreadable cache file is not an error; it selects the fallback mode.
    pub fn discover(cache: Option<&Path>) -> Environment {
        let mut env = Environment::fallback();
        if let Some(path) = cache {
            if let Ok(text) = fs::read_to_string(path) {
                env.apply(parse_cache(&text));
                // Cache mode: the invocation directory is part of a build
                // tree, so per-test workdirs are created right there.
                env.work_root = PathBuf::from(".");
            }
        }
        env.debug = debug_requested();
        env
    }

    /// In-source layout: the directory of the running binary is the root,
    /// with `tools/` and `sources/` next to it, LLVM tools on PATH, and
    /// per-test working directories created under the root itself.
    fn fallback() -> Environment {
        let root = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Environment {
            tools_dir: root.join("tools"),
            sources_dir: root.join("sources"),
            llvm_tools_dir: PathBuf::new(),
            compiler: PathBuf::from("clang"),
            work_root: root,
            have_svf: false,
            clang_has_sanitizers: false,
            debug: false,
        }
    }

    fn apply(&mut self, values: CacheValues) {
        if let Some(root) = values.source_root {
            self.sources_dir = root.join("tests").join("slicing").join("sources");
        }
        if let Some(root) = values.binary_root {
            self.tools_dir = root.join("tools");
        }
        if let Some(dir) = values.llvm_tools {
            self.llvm_tools_dir = dir;
        }
        self.compiler = match values.compiler {
            Some(path) => path,
            None => self.llvm_tool("clang"),
        };
        self.have_svf = values.have_svf;
        self.clang_has_sanitizers = values.sanitizers;
    }

    fn llvm_tool(&self, name: &str) -> PathBuf {
        if self.llvm_tools_dir.as_os_str().is_empty() {
            PathBuf::from(name)
        } else {
            self.llvm_tools_dir.join(name)
        }
    }

    pub fn clang(&self) -> PathBuf {
        self.compiler.clone()
    }

    pub fn llvm_link(&self) -> PathBuf {
        self.llvm_tool("llvm-link")
    }

    pub fn opt(&self) -> PathBuf {
        self.llvm_tool("opt")
    }

    pub fn lli(&self) -> PathBuf {
        self.llvm_tool("lli")
    }

    pub fn slicer(&self) -> PathBuf {
        self.tools_dir.join("llvm-slicer")
    }

    /// Header force-included into every compiled test source.
    pub fn support_header(&self) -> PathBuf {
        self.sources_dir.join("..").join("test_assert.h")
    }

    /// Implementation of the assertion function, linked after slicing.
    pub fn support_source(&self) -> PathBuf {
        self.sources_dir.join("..").join("test_assert.c")
    }
}

/// Debug mode follows the original convention of a `*debug*` program name,
/// plus an environment variable for when the binary cannot be renamed.
fn debug_requested() -> bool {
    if std::env::var_os("SLICETEST_DEBUG").is_some() {
        return true;
    }
    // Only the file name counts; the full path of a dev build always
    // contains "debug".
    std::env::args()
        .next()
        .and_then(|argv0| {
            Path::new(&argv0)
                .file_name()
                .map(|name| name.to_string_lossy().contains("debug"))
        })
        .unwrap_or(false)
}

/// Parse the line-oriented cache. Accepted forms per line are `KEY=value`,
/// `KEY:TYPE=value` (CMake cache style) and `KEY value`.
fn parse_cache(text: &str) -> CacheValues {
    let mut values = CacheValues::default();
    for line in text.lines() {
        apply_cache_line(&mut values, line);
    }
    values
}

fn apply_cache_line(values: &mut CacheValues, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
        return;
    }
    let (key, value) = match line.split_once('=') {
        Some((k, v)) => (k, v),
        None => match line.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v),
            None => return,
        },
    };
    // CMake writes `KEY:TYPE=value`; the type annotation is irrelevant here.
    let key = key.split(':').next().unwrap_or(key).trim();
    let value = value.trim();

    match key {
        SVF_KEY => values.have_svf = found(value),
        SANITIZERS_KEY => values.sanitizers = truthy(value),
        SOURCE_ROOT_KEY => values.source_root = Some(PathBuf::from(value)),
        BINARY_ROOT_KEY => values.binary_root = Some(PathBuf::from(value)),
        LLVM_TOOLS_KEY => values.llvm_tools = Some(PathBuf::from(value)),
        COMPILER_KEY => values.compiler = Some(PathBuf::from(value)),
        _ => {}
    }
}

/// CMake records an absent optional dependency as `<KEY>-NOTFOUND`.
fn found(value: &str) -> bool {
    !value.is_empty() && !value.ends_with("-NOTFOUND")
}

fn truthy(value: &str) -> bool {
    !matches!(value, "" | "0" | "OFF" | "FALSE" | "NO")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_accepts_cmake_and_plain_forms() {
        let values = parse_cache(
            "# comment\n\
             SVF_DIR:PATH=/opt/svf\n\
             CLANG_HAS_SANITIZERS:BOOL=ON\n\
             dg_SOURCE_DIR=/src/tree\n\
             dg_BINARY_DIR /build/tree\n\
             LLVM_TOOLS_DIR=/usr/lib/llvm/bin\n",
        );
        assert!(values.have_svf);
        assert!(values.sanitizers);
        assert_eq!(values.source_root.as_deref(), Some(Path::new("/src/tree")));
        assert_eq!(values.binary_root.as_deref(), Some(Path::new("/build/tree")));
        assert_eq!(
            values.llvm_tools.as_deref(),
            Some(Path::new("/usr/lib/llvm/bin"))
        );
    }

    #[test]
    fn notfound_backend_stays_disabled() {
        let values = parse_cache("SVF_DIR:PATH=SVF_DIR-NOTFOUND\nCLANG_HAS_SANITIZERS:BOOL=OFF\n");
        assert!(!values.have_svf);
        assert!(!values.sanitizers);
    }

    #[test]
    fn unrecognized_keys_are_ignored() {
        let values = parse_cache("CMAKE_BUILD_TYPE:STRING=Debug\ngarbage line without pair\n");
        assert_eq!(values, CacheValues::default());
    }

    #[test]
    fn cache_paths_land_in_environment() {
        let mut env = Environment::fallback();
        env.apply(parse_cache(
            "dg_SOURCE_DIR=/src\ndg_BINARY_DIR=/build\nLLVM_TOOLS_DIR=/llvm\n",
        ));
        assert_eq!(env.sources_dir, Path::new("/src/tests/slicing/sources"));
        assert_eq!(env.tools_dir, Path::new("/build/tools"));
        assert_eq!(env.slicer(), Path::new("/build/tools/llvm-slicer"));
        assert_eq!(env.clang(), Path::new("/llvm/clang"));
        assert_eq!(env.lli(), Path::new("/llvm/lli"));
    }

    #[test]
    fn fallback_workdirs_live_under_the_binary_root() {
        let env = Environment::fallback();
        assert_eq!(env.tools_dir.parent(), Some(env.work_root.as_path()));
        assert_eq!(env.sources_dir.parent(), Some(env.work_root.as_path()));
    }

    #[test]
    fn cache_mode_workdirs_live_under_the_invocation_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("CMakeCache.txt");
        fs::write(&cache, "dg_BINARY_DIR=/build/tree\n").unwrap();
        let env = Environment::discover(Some(&cache));
        assert_eq!(env.work_root, Path::new("."));
        assert_eq!(env.tools_dir, Path::new("/build/tree/tools"));
    }

    #[test]
    fn explicit_compiler_wins_over_llvm_dir() {
        let mut env = Environment::fallback();
        env.apply(parse_cache(
            "LLVM_TOOLS_DIR=/llvm\nCMAKE_C_COMPILER:FILEPATH=/usr/bin/clang-17\n",
        ));
        assert_eq!(env.clang(), Path::new("/usr/bin/clang-17"));
    }
}
