pub mod broker;
pub mod clock;
pub mod config;
pub mod history;
pub mod http;
pub mod models;
pub mod status;
