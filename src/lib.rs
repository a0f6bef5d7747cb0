//! # pbuf - protobuf schema vendoring
//!
//! Copies `.proto` files declared in `pbuf.yaml` from git repositories or a
//! pbuf registry into the local tree, optionally rewriting
//! `option go_package` so generated Go code lands in the right package.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a manifest
//! pbuf init acme/api
//!
//! # Fetch every declared module
//! pbuf vendor
//! ```
//!
//! ## Module Organization
//!
//! - [`vendor`] - The vendoring engine, path remapping and run reports
//! - [`fetch`] - Repository and registry sources
//! - [`patcher`] - Content rewriting applied before files are written
//! - [`config`] - Manifest parsing (`pbuf.yaml`)
//! - [`commands`] - CLI command handlers

/// Credential lookup (`.netrc`).
pub mod auth;

/// CLI command handlers extracted from main.
pub mod commands;

/// Manifest parsing (`pbuf.yaml`).
pub mod config;

/// Error kinds shared by the engine and fetchers.
pub mod error;

/// Module sources: git repositories and the registry.
pub mod fetch;

/// Schema content patchers.
pub mod patcher;

/// Vendoring engine.
pub mod vendor;
