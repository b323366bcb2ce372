//! Library half of the `shantilly` command: configuration loading, provider
//! wiring, evaluation, and output rendering. The binary in `main.rs` only
//! parses arguments and dispatches here.

pub mod eval;
pub mod output;
pub mod setup;
