//! HomeSeer status library
//!
//! This crate reads device state from a HomeSeer hub through its
//! `/JSON?request=getstatus` interface:
//!
//! - [`device`] - Snapshot data model (`StatusReport`, `Device`, `Relationship`)
//! - [`date`] - Decoding of the hub's `/Date(<millis>)/` timestamps
//! - [`client`] - HTTP client with optional basic authentication
//! - [`error`] - Error types
//!
//! The hub is only ever read. Nothing in this crate changes device state.

pub mod client;
pub mod date;
pub mod device;
pub mod error;

pub use client::{Credentials, STATUS_PATH, StatusClient};
pub use date::{NEVER, decode_last_change};
pub use device::{Device, DeviceType, Relationship, StatusReport};
pub use error::{CredentialsError, DateError, FetchError, Result};
