//! Non-pricing route handlers

pub mod health;
