//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the cloud provider APIs,
//! SSH and local process transports, and config file access.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod aliyun;
pub mod config;
pub mod domains;
pub mod local;
pub mod ssh;
