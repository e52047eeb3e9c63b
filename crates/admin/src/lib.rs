//! Stockline Admin library.
//!
//! This crate provides the availability service as a library,
//! allowing it to be tested and reused.
//!
//! # Security
//!
//! Every `/api/*` route requires the admin API token. Rule edits change
//! what buyers, reps and exports see, so only deploy on private
//! infrastructure.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
