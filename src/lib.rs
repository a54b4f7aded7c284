pub mod app;
pub mod cli;
pub mod config;
pub mod global;
pub mod runner;
pub mod scan;
pub mod state;
pub mod ui;
pub mod workflow;
