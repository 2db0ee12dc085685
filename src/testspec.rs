//! Test declarations and the named registry.
//!
//! A [`TestSpec`] describes one test case: the primary source, auxiliary
//! sources linked before or after slicing, optimizer pass lists, compiler
//! flags, the parameter subset a setup must carry for the test to be enabled,
//! extra slicer flags, and an optional expected-output reference.
//!
//! Registries are declared in YAML, one spec per test name:
//!
//! ```yaml
//! list-iteration:
//!   source: list-iteration.c
//!   required_params: ["-pta=fs"]
//!   expected_output: list-iteration.expected
//! ```
//!
//! When no `tests.yaml` sits next to the sources directory, a built-in
//! registry of the stock slicing tests is used instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::environment::Environment;
use crate::errors::{Error, Result};
use crate::matrix::Setup;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    /// Primary C source, relative to the sources directory.
    pub source: String,
    /// Auxiliary sources compiled and linked before slicing.
    #[serde(default)]
    pub link_before: Vec<String>,
    /// Auxiliary sources compiled and linked after slicing.
    #[serde(default)]
    pub link_after: Vec<String>,
    /// Optimizer passes applied before slicing.
    #[serde(default)]
    pub opt_before: Vec<String>,
    /// Optimizer passes applied after slicing.
    #[serde(default)]
    pub opt_after: Vec<String>,
    /// Extra compiler flags for every compile of this test.
    #[serde(default)]
    pub compiler_params: Vec<String>,
    /// Setup tokens that must all be present for the test to run.
    #[serde(default)]
    pub required_params: Vec<String>,
    /// Extra slicer flags appended to every setup's tokens.
    #[serde(default)]
    pub add_params: Vec<String>,
    /// Reference output file, relative to the sources directory. Absent
    /// means the default assertion-marker oracle applies.
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl TestSpec {
    /// A setup is enabled for this test iff it carries every required token.
    pub fn enabled_in(&self, setup: &Setup) -> bool {
        self.required_params.iter().all(|p| setup.contains(p))
    }

    /// Reject declarations the pipeline cannot order deterministically.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.opt_after.is_empty() && !self.link_after.is_empty() {
            return Err(Error::ConflictingPostStages {
                test: name.to_string(),
            });
        }
        Ok(())
    }
}

/// All known tests, keyed by name. Iteration order is the name order.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    tests: BTreeMap<String, TestSpec>,
}

impl TestRegistry {
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let tests: BTreeMap<String, TestSpec> = serde_yaml::from_str(text)?;
        Ok(Self { tests })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| Error::Registry {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Registry for this environment: `tests.yaml` next to the sources
    /// directory when present, the built-in set otherwise.
    pub fn discover(env: &Environment) -> Result<Self> {
        let declared = env.sources_dir.join("..").join("tests.yaml");
        if declared.is_file() {
            Self::load(&declared)
        } else {
            Ok(Self::builtin())
        }
    }

    /// The stock slicing tests.
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_TESTS).unwrap_or_else(|e| {
            // The built-in declaration is part of the binary; a parse
            // failure here is a programming error, not a runtime condition.
            panic!("built-in test registry is malformed: {e}")
        })
    }

    pub fn get(&self, name: &str) -> Result<&TestSpec> {
        self.tests.get(name).ok_or_else(|| Error::UnknownTest {
            name: name.to_string(),
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: TestSpec) {
        self.tests.insert(name.into(), spec);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

const BUILTIN_TESTS: &str = r#"
basic-assert:
  source: basic-assert.c

global-variables:
  source: global-variables.c

struct-fields:
  source: struct-fields.c
  compiler_params: ["-O0"]

list-iteration:
  source: list-iteration.c
  required_params: ["-pta=fs"]

undefined-functions:
  source: undefined-functions.c
  link_after: [undefined-functions-impl.c]
  expected_output: undefined-functions.expected

phi-placement:
  source: phi-placement.c
  opt_before: ["-mem2reg"]

mem2reg-roundtrip:
  source: mem2reg-roundtrip.c
  opt_after: ["-mem2reg"]

shared-helpers:
  source: shared-helpers.c
  link_before: [shared-helpers-lib.c]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_parses() {
        let registry = TestRegistry::builtin();
        assert!(!registry.is_empty());
        assert!(registry.get("basic-assert").is_ok());
        assert!(matches!(
            registry.get("no-such-test"),
            Err(Error::UnknownTest { .. })
        ));
    }

    #[test]
    fn yaml_declaration_round_trips_fields() {
        let declaration = [
            "sample:",
            "  source: sample.c",
            "  required_params: [\"-pta=inv\"]",
            "  add_params: [\"-entry=main\"]",
            "  expected_output: sample.expected",
        ]
        .join("\n");
        let registry = TestRegistry::from_yaml(&declaration).unwrap();
        let spec = registry.get("sample").unwrap();
        assert_eq!(spec.source, "sample.c");
        assert_eq!(spec.required_params, ["-pta=inv"]);
        assert_eq!(spec.add_params, ["-entry=main"]);
        assert_eq!(spec.expected_output.as_deref(), Some("sample.expected"));
    }

    #[test]
    fn enablement_requires_every_token() {
        let spec = TestSpec {
            source: "t.c".into(),
            required_params: vec!["-pta=fs".into(), "-cd-alg=ntscd".into()],
            ..TestSpec::default()
        };
        assert!(spec.enabled_in(&Setup::from_tokens(["-pta=fs", "-cd-alg=ntscd"])));
        assert!(!spec.enabled_in(&Setup::from_tokens(["-pta=fs", "-cd-alg=classic"])));
        assert!(!spec.enabled_in(&Setup::empty()));
    }

    #[test]
    fn no_required_params_enables_everything() {
        let spec = TestSpec {
            source: "t.c".into(),
            ..TestSpec::default()
        };
        assert!(spec.enabled_in(&Setup::empty()));
        assert!(spec.enabled_in(&Setup::from_tokens(["-pta=fi"])));
    }

    #[test]
    fn post_opt_and_post_link_is_rejected() {
        let spec = TestSpec {
            source: "t.c".into(),
            opt_after: vec!["-mem2reg".into()],
            link_after: vec!["aux.c".into()],
            ..TestSpec::default()
        };
        assert!(matches!(
            spec.validate("bad"),
            Err(Error::ConflictingPostStages { .. })
        ));
    }
}
