pub mod config;
pub mod downloader;

pub use config::DownloaderConfig;
pub use downloader::HttpFetcher;
