//! GECR Store Library
//!
//! Session store, auth gateway and guarded router for the inventory
//! dashboard, plus the pages and services they drive. The binary is a thin
//! terminal shell over [`app::App`].

pub mod app;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod format;
pub mod observer;
pub mod pages;
pub mod router;
pub mod shell;
pub mod toast;
