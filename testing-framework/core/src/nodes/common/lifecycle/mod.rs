pub mod kill;
pub mod monitor;
