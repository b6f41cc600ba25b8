//! # wip CLI Library
//!
//! Command layer of the `wip` binary: context gathering, user configuration,
//! rendering and the subcommands built on `wips-store`.

pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod filter;
pub mod render;

pub use app::App;
pub use config::UserConfig;
