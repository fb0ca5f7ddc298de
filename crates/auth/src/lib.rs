//! Client-side OAuth 2.0 authorization code flow with PKCE.
//!
//! The entry point is [`ClientRegistry::get`], which hands out one
//! [`AuthorizationClient`] per client identifier. A client resumes a cached
//! session or finishes an authorization returned in the current location,
//! logs the user in through a popup or a full-page redirect, keeps the
//! access token fresh, and publishes its state through observable cells.
//!
//! The environment is injected through [`ClientOptions`]: a
//! [`StorageMedium`](sessionkit_common::storage::StorageMedium) for
//! persistence, an [`HttpTransport`] for provider requests, a
//! [`BrowserHost`] for location, navigation and popup messaging, and a
//! [`Clock`](sessionkit_common::time::Clock).
//!
//! # Feature Flags
//!
//! - `test-utils`: [`testing::MockTransport`] for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod loading;
pub mod pkce;
pub mod provider;
pub mod registry;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::AuthorizationClient;
pub use config::{ClientOptions, ClientOptionsBuilder, ClientSettings};
pub use error::AuthError;
pub use host::{MemoryHost, MemoryPopup};
pub use pkce::PkcePair;
pub use registry::ClientRegistry;
pub use traits::{BrowserHost, HttpRequest, HttpResponse, HttpTransport, PopupWindow};
pub use transport::ReqwestTransport;
pub use types::{AuthCodeResult, SessionState, Token, User, WindowMessage};
