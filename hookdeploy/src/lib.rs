//! Hookdeploy Library
//!
//! Webhook-triggered Git deployment: authenticate a push notification,
//! bring a target directory in line with a remote branch, run post-deploy
//! commands, and stream the transcript back to the caller.

pub mod app;
pub mod deploy;
pub mod diagnostics;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
