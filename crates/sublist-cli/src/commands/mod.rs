//! Command handlers

pub mod config;
pub mod subscriber;
