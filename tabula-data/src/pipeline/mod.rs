//! End-to-end request handling: fetch, normalize, then respond or store.
#![forbid(unsafe_code)]

mod error;
mod service;

pub use error::{IngestError, ServiceBuildError};
pub use service::IngestService;

#[cfg(test)]
mod tests;
