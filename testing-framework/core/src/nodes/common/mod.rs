pub mod binary;
pub mod config;
pub mod lifecycle;
pub mod node;
