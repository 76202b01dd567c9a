//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `credits` - Credit balance endpoint
//! - `payment` - Purchase initiation and gateway callback
//! - `speak` - Text-to-speech REST API
//! - `talking_image` - Portrait animation endpoint
//! - `voices` - Voice cloning endpoint

pub mod api;
pub mod credits;
pub mod payment;
pub mod speak;
pub mod talking_image;
pub mod voices;

// Re-export commonly used handlers for convenient access
pub use api::health_check;
pub use payment::{initiate_payment, payment_callback};
