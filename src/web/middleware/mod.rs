//! Middleware for the web API.

pub mod auth;
