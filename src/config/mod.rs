// src/config/mod.rs

//! Configuration loading and validation for wasmtest.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk, with built-in defaults when no file exists
//!   (`loader.rs`).
//! - Validation into a ready-to-use [`ConfigFile`] (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, DEFAULT_TEST_DIR, InstallSection, RawConfigFile, RunSection, ShimSection,
    normalize_dir,
};
