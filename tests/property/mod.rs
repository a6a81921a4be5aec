//! Property-based tests for the contract engine

mod determinism;
mod encoding;
mod parity;
