pub mod accounts;
pub mod app;
pub mod auth;
pub mod capacity;
pub mod config;
pub mod error;
pub mod push;
pub mod remote;
pub mod report;
pub mod runner;
pub mod sign;
