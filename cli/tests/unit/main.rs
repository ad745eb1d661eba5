//! Unit tests for ecsup
//!
//! These tests use fake ports, local processes and loopback servers, and
//! run without network access.

mod architecture;
mod fakes;
mod network_tests;
mod property_tests;
mod registration_tests;
mod transfer_tests;
