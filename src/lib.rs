pub mod auth;
pub mod cli;
pub mod config;
pub mod payload;
pub mod poller;
pub mod session;
pub mod sink;
