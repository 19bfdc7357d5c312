//! Read-only zip container support.
//!
//! - [`structures`]: fixed-layout records (EOCD, ZIP64 records, entry metadata)
//! - [`parser`]: locates and walks the central directory
//! - [`extractor`]: reads, inflates and CRC-checks single entries
//!
//! STORED and DEFLATE entries are supported, as are ZIP64 archives.
//! Encrypted and multi-disk archives are rejected.

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
