//! CLI command implementations.

pub mod call;
pub mod hello;
pub mod listen;
