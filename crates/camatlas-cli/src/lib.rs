//! camatlas CLI: batch extraction of live-camera listing pages.

pub mod cli;
pub mod http_loader;

pub use http_loader::HttpLoader;
