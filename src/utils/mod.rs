pub mod files;

pub use files::{copy_directory, copy_file, exists, latest_timestamp, symlink, target_needs_update};
