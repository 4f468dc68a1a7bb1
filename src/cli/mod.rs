//! Command Line Interface (CLI) layer for UNETILE.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for single-file and batch
//! prediction. It wires user-provided options to `unetile::api`.
//!
//! If you are embedding UNETILE into another application, prefer the
//! high-level `unetile::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
