//! Review Harvest — review-collection campaign engine.

pub mod campaign;
pub mod config;
pub mod error;
pub mod phone;
pub mod provider;
pub mod sentiment;
pub mod session;
pub mod store;
pub mod templates;
