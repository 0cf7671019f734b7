//! Position tracking and reconciliation for code annotations.
//!
//! A [`Marker`](types::Marker) binds annotation ids to a line. It is anchored
//! semantically (the chain of symbols enclosing the line) when a
//! [`SymbolProvider`](provider::SymbolProvider) is available, and always
//! carries a content fingerprint. The [`MarkerManager`](manager::MarkerManager)
//! shifts markers synchronously on every edit, duplicates them on copy/paste,
//! and verifies them on a debounce, auto-fixing drift where it can.

pub mod anchor;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod grammar;
pub mod manager;
pub mod orphan;
pub mod outline;
pub mod provider;
pub mod schedule;
pub mod store;
pub mod types;
pub mod verify;

pub use document::{DocumentAccessor, Position, TextDocument, TextEdit};
pub use error::Error;
pub use manager::MarkerManager;
pub use provider::SymbolProvider;
