//! CDX generation for replay tools.
//!
//! Replay tools ask for the captures of a URL (or URL prefix) closest to
//! some moment. [`NearestResolver`] orders committed versions for that,
//! and [`CdxRecord`] renders each one in the columnar, CDXJ or XML form
//! those tools read. The renderings are wire formats and must not change.

mod key;
mod record;
mod resolver;

pub use key::url_sort_key;
pub use record::{parse_cdx_timestamp, CdxFormat, CdxRecord, CdxRecords, CDX_TIMESTAMP_FORMAT};
pub use resolver::{Capture, NearestResolver};
