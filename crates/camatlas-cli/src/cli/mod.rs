//! Subcommand implementations for the `camatlas` binary.
//!
//! Each command returns data; printing is left to `main`.

pub mod extract_cmd;
pub mod run_cmd;
pub mod tile_cmd;

pub use run_cmd::RunOptions;
