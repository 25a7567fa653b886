//! Bucketkit Core Library
//!
//! This crate provides the configuration and shared types used by the storage
//! manager and the command-line client.

pub mod config;
pub mod storage_types;

// Re-export commonly used types
pub use config::StorageConfig;
pub use storage_types::StorageBackend;
