//! # Remote
//!
//! Everything the site reads from somewhere else.
//!
//! - [`backend`]: the hosted data/auth service, table-like rows plus password auth
//! - [`supabase`]: the HTTP implementation of that service
//! - [`memory`]: an in-process implementation for local development and tests
//! - [`feed`]: row-change notifications pushed by the backend
//! - [`probe`]: third-party server-status and identity-verification endpoints
pub mod backend;
pub mod error;
pub mod feed;
pub mod memory;
pub mod models;
pub mod probe;
pub mod supabase;

pub use backend::{Backend, Query, Record, Tables};
pub use error::RemoteError;
pub use feed::ChangeFeed;
pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;
