//! Integration tests against a live PostgreSQL server.

pub mod common;
pub mod plans_test;
pub mod provision_test;
