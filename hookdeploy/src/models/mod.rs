pub mod config;
pub mod deployment;
