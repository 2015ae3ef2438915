//! CLI command implementations.

pub mod decode;
pub mod route;
pub mod simulate;
pub mod topology;
