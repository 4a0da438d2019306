//! Meal Coach: nutrition coaching backend.

pub mod api;
pub mod auth;
pub mod coach;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod progress;
pub mod store;
