//! Configuration axes and setup generation.
//!
//! A [`ConfigAxis`] is a named dimension with a small enumerated set of
//! values; a [`Setup`] is one concrete `name=value` choice across all axes.
//! [`ConfigMatrix::setups`] enumerates the full cartesian product in a fixed
//! order so a run is reproducible from its log alone.

use std::fmt;

use crate::environment::Environment;

/// Points-to analysis mode axis.
pub const PTA_AXIS: &str = "-pta";
/// Control-dependence algorithm axis.
pub const CD_ALG_AXIS: &str = "-cd-alg";

/// One named configuration dimension. Every axis has at least one value and
/// axis names are unique within a matrix.
#[derive(Debug, Clone)]
pub struct ConfigAxis {
    pub name: String,
    pub values: Vec<String>,
}

impl ConfigAxis {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn token(&self, value: &str) -> String {
        format!("{}={}", self.name, value)
    }
}

/// One point of the configuration cross-product: exactly one `axis=value`
/// token per axis, in declaration order. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    tokens: Vec<String>,
}

impl Setup {
    /// Build a setup from externally supplied tokens (the explicit
    /// single-setup path of the CLI).
    pub fn from_tokens(tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// The fixed set of configuration axes for a run.
#[derive(Debug, Clone, Default)]
pub struct ConfigMatrix {
    axes: Vec<ConfigAxis>,
}

impl ConfigMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_axis(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.axes.push(ConfigAxis::new(name, values));
    }

    /// Append one value to an already declared axis. This is how
    /// conditionally available backends join the matrix before generation.
    /// Returns false when no axis of that name exists.
    pub fn extend_axis(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.axes.iter_mut().find(|a| a.name == name) {
            Some(axis) => {
                axis.values.push(value.into());
                true
            }
            None => false,
        }
    }

    pub fn axes(&self) -> &[ConfigAxis] {
        &self.axes
    }

    /// Number of setups the product will contain.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full cartesian product, one [`Setup`] per point.
    ///
    /// The first-declared axis varies slowest; within each setup the tokens
    /// appear in axis declaration order. Zero axes yield exactly one empty
    /// setup, the identity case for tests with no required parameters.
    pub fn setups(&self) -> Vec<Setup> {
        let mut product: Vec<Vec<String>> = vec![Vec::new()];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(product.len() * axis.values.len());
            for prefix in &product {
                for value in &axis.values {
                    let mut tokens = prefix.clone();
                    tokens.push(axis.token(value));
                    next.push(tokens);
                }
            }
            product = next;
        }
        product.into_iter().map(|tokens| Setup { tokens }).collect()
    }
}

/// The stock matrix: points-to mode and control-dependence algorithm, with
/// the SVF backend joining the points-to axis when the build found it.
pub fn default_matrix(env: &Environment) -> ConfigMatrix {
    let mut matrix = ConfigMatrix::new();
    matrix.add_axis(PTA_AXIS, ["fi", "fs", "inv"]);
    matrix.add_axis(CD_ALG_AXIS, ["ntscd", "classic"]);
    if env.have_svf {
        matrix.extend_axis(PTA_AXIS, "svf");
    }
    matrix
}
