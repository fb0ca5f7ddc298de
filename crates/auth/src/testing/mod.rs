//! Test doubles for the authorization client
//!
//! - **[`mocks`]**: scripted [`HttpTransport`](crate::traits::HttpTransport)
//!
//! The in-memory browser host lives in [`crate::host`] because embedders use
//! it outside tests too.

pub mod mocks;

pub use mocks::MockTransport;
