//! Route definitions
//!
//! Routers are created stateless and composed in `main.rs`, where the
//! shared state and middleware layers are attached.

pub mod api;
pub mod callbacks;
