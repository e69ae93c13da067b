//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes each source's posts to a dated JSON file
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-12/
//!     ├── vecherka.json
//!     └── big_rostov.json
//! ```

pub mod json;
