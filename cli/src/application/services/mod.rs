//! Application services — use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports` — never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod bootstrap;
pub mod inventory;
pub mod network;
pub mod polling;
pub mod proxy;
pub mod reconcile;
pub mod registration;
pub mod shell;
pub mod transfer;

pub use polling::Polling;
