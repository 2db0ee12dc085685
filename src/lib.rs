pub use crate::errors::{Error, Result};

pub mod cli;
pub mod environment;
pub mod errors;
pub mod matrix;
pub mod oracle;
pub mod phase;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod runner;
pub mod testspec;
