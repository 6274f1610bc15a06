pub mod bot;
pub mod bridge;
pub mod cat;
pub mod commands;
pub mod config;
pub mod pet;
pub mod registry;
pub mod storage;
pub mod triggers;
