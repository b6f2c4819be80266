//! # Folio
//!
//! HTTP backend for a small publishing site: blog posts, named static pages
//! and the login sessions that guard every write.
//!
//! ## Sessions and penalties
//!
//! `POST /login` checks a passphrase against its Argon2id hash and issues a
//! random secret bound to the caller's origin (or identity, see
//! `--session-scope`). A failed login blocks further login attempts from the
//! same origin until a later explicit clear or successful login; the block is a
//! flag, not a counter.
//!
//! ## Writes
//!
//! Writes that insert dependent rows (content first, then its index entry) run
//! through [`store::TransactionSequencer`], which applies each [`store::Step`]
//! in one transaction and rolls everything back on the first failure or when
//! the request deadline passes. Single-statement writes use
//! [`store::ConnectionExecutor`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod context;
pub mod error;
pub mod store;
