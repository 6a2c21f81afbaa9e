pub mod api;
pub mod config;
pub mod controller;
pub mod history;
pub mod poller;
pub mod session;
pub mod shared;
pub mod triage;
