pub mod atomic_write;

pub use atomic_write::{replace_file, temp_path_for};
