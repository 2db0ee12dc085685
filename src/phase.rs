//! Failure-phase classification for benchmark reporting.
//!
//! Given the captured output of one pipeline run, [`PhaseClassifier`]
//! determines which stage was active when the run stopped. Echoed command
//! lines (`> clang ...`) act as stage markers; a single pass over the lines
//! applies an ordered rule list per line and the *last* match wins, so the
//! final label names the most recently observed stage.

use crate::process::RunResult;

/// Label reported when no stage marker was ever observed.
pub const PHASE_START: &str = "start";
/// Label reported for a clean exit.
pub const PHASE_DONE: &str = "done";

/// Ordered `(marker, label)` rules, scanned per output line.
#[derive(Debug, Clone, Default)]
pub struct PhaseClassifier {
    rules: Vec<(String, String)>,
}

impl PhaseClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard rule set for a slicing pipeline wrapping `tool`: the
    /// LLVM stages first, the tool under test last so its marker outranks
    /// them on a shared line.
    pub fn for_tool(tool: &str) -> Self {
        let mut classifier = Self::new();
        classifier.push_rule("clang", "clang");
        classifier.push_rule("opt", "opt");
        classifier.push_rule("llvm-link", "llvm-link");
        classifier.push_rule("lli", "lli");
        classifier.push_rule(tool, tool);
        classifier
    }

    pub fn push_rule(&mut self, marker: impl Into<String>, label: impl Into<String>) {
        self.rules.push((marker.into(), label.into()));
    }

    /// Single stateful pass over `lines` in order; returns the label of the
    /// last marker seen, or [`PHASE_START`] when none matched.
    pub fn classify<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> String {
        let mut label = PHASE_START.to_string();
        for line in lines {
            for (marker, rule_label) in &self.rules {
                if line.contains(marker.as_str()) {
                    label = rule_label.clone();
                }
            }
        }
        label
    }
}

/// Classify one run's output for the benchmark table.
pub fn classify(tool: &str, output: &str) -> String {
    PhaseClassifier::for_tool(tool).classify(output.lines())
}

/// The outward benchmark label: the bare phase on timeout, an error label
/// parameterized by the phase on unclean exit, a fixed label on clean exit.
pub fn outcome_label(phase: &str, status: Option<i32>, timed_out: bool) -> String {
    if timed_out {
        phase.to_string()
    } else if status == Some(0) {
        PHASE_DONE.to_string()
    } else {
        format!("error({phase})")
    }
}

/// Convenience over a captured [`RunResult`].
pub fn label_run(tool: &str, run: &RunResult) -> String {
    let phase = classify(tool, &run.stdout_text());
    outcome_label(&phase, run.status, run.timed_out)
}
