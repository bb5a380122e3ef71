#![forbid(unsafe_code)]

//! Asset optimizer (aopt): build-time recompression of oversized raster images.
//!
//! One run does four things:
//! 1. **Scan** the public images tree for PNG/JPEG files above a size threshold
//! 2. **Transcode** each one to a WebP sibling through an external encoder
//! 3. **Rewrite** every literal reference to the old path across the project's text files
//! 4. **Clean up** the original once no old reference form remains
//!
//! # Library usage
//!
//! ```rust,no_run
//! use asset_optimizer::prelude::*;
//!
//! # fn main() -> asset_optimizer::core::errors::Result<()> {
//! let config = Config::load(std::path::Path::new("."), None)?;
//! let options = config.resolve_options(&OptionOverrides::default())?;
//! let report = Optimizer::new(".", config, options).run()?;
//! println!("{} images optimized", report.converted);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod pipeline;
pub mod rewrite;
pub mod scanner;
pub mod transcode;
