pub mod setups;
pub mod signals;
