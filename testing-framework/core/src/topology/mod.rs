pub mod config;
pub mod configs;
pub mod deployment;
pub mod generation;
pub mod utils;
