//! Core business logic for iblog.

pub mod services;

pub use services::*;
