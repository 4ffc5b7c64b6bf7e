pub mod crc32; // Pure Rust CRC32 implementation, used by the WAL
pub mod error; // ThemisError taxonomy, used by every manager in this crate
pub mod hex; // Pure Rust hex encoding, used to render Blob values
pub mod types;

pub use error::{Result as ThemisResult, ThemisError};
