//! campusfin - financial service for an educational platform.
//!
//! Manages student course payments, enrollment lifecycle, and periodic
//! center invoicing:
//!
//! - REST endpoints gated by role-based JWT middleware (`server`)
//! - the billing-cycle calculator and invoice numbering (`billing`)
//! - invoice PDF rendering with PAID watermarking (`pdf`)
//! - filesystem document storage (`storage`)
//! - a daily enrollment expiry sweep (`jobs`)
//!
//! Database backends are selected by feature flag:
//!
//! ```toml
//! # Use the default (sqlite)
//! campusfin = { version = "0.3" }
//!
//! # PostgreSQL backend
//! campusfin = { version = "0.3", default-features = false, features = ["postgres"] }
//! ```

pub mod billing;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod pdf;
pub mod server;
pub mod storage;
