//! Shared utilities for the Strata IR.
mod errors;
mod id;
mod namegenerator;

pub use errors::{Error, StrataResult};
pub use id::{GetName, Id};
pub use namegenerator::NameGenerator;
