pub mod audit;
pub mod flags;
pub mod system;
