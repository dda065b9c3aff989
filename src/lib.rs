//! # Driftwood
//!
//! REST backend for a small social network: accounts, friendships,
//! posts with likes and comments, direct messages, notifications and
//! 24-hour stories, backed by SQLite.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;
pub mod uploads;
pub mod urls;
pub mod validation;
