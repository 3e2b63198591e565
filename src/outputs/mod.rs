//! Output writers.
//!
//! - [`csv`]: the merged record set, one row per news item
//! - [`json`]: optional run report with per-ticker results and the summary
//!
//! ```text
//! output_dir/
//! └── financial_news_20250506_143005.csv
//! ```

pub mod csv;
pub mod json;
