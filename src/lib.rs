pub mod auth;
pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod job;
pub mod pagination;
pub mod records;
pub mod secrets;
pub mod transport;

pub use client::CloudDns;
pub use error::{Error, Result};
pub use job::{await_status, ErrorDetail, JobDescriptor, JobStatus, PollOptions};
pub use pagination::{Flow, Page, PageCursor, Pager};
pub use transport::{HttpTransport, Transport};
