//! The DomainLang workspace dependency manager.
//!
//! This crate implements manifest/lock parsing, specifier and ref
//! classification, the content-addressed package cache, integrity
//! verification, semver tag comparison, and the installer that ties them
//! together. The CLI in `domainlang-cli` is a thin front end over
//! [`Workspace`].

pub mod cache;
pub mod credentials;
pub mod error;
pub mod host;
pub mod installer;
pub mod integrity;
pub mod lock;
pub mod manifest;
pub mod progress;
pub mod semver_cmp;
pub mod spec;
pub mod workspace_lock;

pub use error::{Error, Result};
pub use installer::Workspace;
