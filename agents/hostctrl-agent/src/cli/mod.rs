//! CLI support: configuration loading and report rendering

pub mod config;
pub mod output;
