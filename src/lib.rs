pub mod config;
pub mod menu;
pub mod quiz;
pub mod session;
