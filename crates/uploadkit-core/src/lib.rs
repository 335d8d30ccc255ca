//! Core traits and types for uploadkit storage back-ends.

pub mod settings;
pub mod storage;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
