//! One module per subcommand. Each writes its user-facing output to the
//! `out` it is handed so tests can capture it.

pub mod capture;
pub mod config;
pub mod delete;
pub mod edit;
pub mod hooks;
pub mod note;
pub mod search;
pub mod summary;
pub mod tail;
