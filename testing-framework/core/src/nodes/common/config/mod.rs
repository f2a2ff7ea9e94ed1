pub mod injection;
pub mod paths;
