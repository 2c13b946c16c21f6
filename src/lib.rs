//! Smartmarks: a minimal personal bookmark manager with live sync.
//!
//! This library crate exposes all modules for use by the RPC binary and integration tests.

pub mod app;
pub mod config;
pub mod database;
pub mod logging;
pub mod managers;
pub mod remote;
pub mod rpc_handler;
pub mod services;
pub mod types;
