//! # Host Bridge Traits
//!
//! Abstraction traits implemented by each host the storefront core runs on.
//!
//! ## Overview
//!
//! This crate defines the contract between the upload core and everything
//! outside it: the storefront backend and the host's display resources.
//! The core never talks to a network or a windowing system directly; it
//! only holds trait objects defined here.
//!
//! ## Traits
//!
//! - [`ListingMediaApi`](api::ListingMediaApi) - the four remote operations
//!   of the upload pipeline (create draft, authorize, transfer, link)
//! - [`PreviewStore`](preview::PreviewStore) - allocation and release of
//!   transient preview display handles
//!
//! ## Error Handling
//!
//! Adapter failures surface as [`BridgeError`](error::BridgeError); the core
//! maps them into its own error taxonomy per pipeline stage.

pub mod api;
pub mod error;
pub mod preview;

pub use api::{DraftId, ListingMediaApi, UploadGrant};
pub use error::{BridgeError, Result};
pub use preview::{PreviewHandle, PreviewId, PreviewStore};
