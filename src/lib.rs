//! # Mscolab
//!
//! Shared flight-track operations with per-user access levels and a git
//! history behind every document. Usable both as a standalone binary and as
//! a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! mscolab = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use mscolab::config::Settings;
//! use mscolab::manager::{FileManager, NewOperationOptions};
//!
//! let manager = FileManager::open(Settings::with_data_dir("./data")).unwrap();
//! let alice = manager.create_user("alice@example.com", "alice", "secret").unwrap();
//! let op = manager
//!     .create_operation("alpha", "first flight", &alice, NewOperationOptions::default())
//!     .unwrap();
//! manager.save_file(op.id, "<FlightTrack/>", &alice, Some("draft")).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
pub mod blob;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod manager;
pub mod permission;
pub mod store;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use manager::FileManager;
