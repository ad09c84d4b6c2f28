//! HTTP API module.
//!
//! Server, response types and the log stream shared with the pipeline.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{clean_upload_bytes, router, start_server};
pub use types::*;
