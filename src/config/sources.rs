//! Configuration sources layered over the merge policy defaults.

pub(crate) mod environment;
pub(crate) mod file;
