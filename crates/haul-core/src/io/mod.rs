//! Artifact transfer to the install directory.

pub mod download;

pub use download::{DownloadRequest, Downloaded};
