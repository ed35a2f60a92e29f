pub mod agent;
pub mod config;
pub mod errors;
pub mod history;
pub mod mcp;
pub mod models;
pub mod output;
pub mod providers;
pub mod registry;
pub mod retry;
