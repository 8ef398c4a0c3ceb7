//! Tauri command handlers

pub mod capture;
pub mod session;
