pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod observer;
pub mod router;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod testing;
