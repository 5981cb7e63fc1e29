//! Deployment module

pub mod auth;
pub mod command;
pub mod fsm;
pub mod git;
pub mod paths;
pub mod pipeline;
pub mod post;
pub mod signature;
pub mod transcript;
