//! Filesystem module.
//!
//! Provides:
//! - Directory management and cleanup of interrupted downloads
//! - Filename generation and sanitising

pub mod naming;
pub mod paths;

pub use naming::{
    asset_filename, is_temp_file, sanitize_component, sanitize_filename, temp_path, TEMP_SUFFIX,
};
pub use paths::{collect_garbage, ensure_dir};
