pub mod checksum;
pub mod config;
pub mod sync;
