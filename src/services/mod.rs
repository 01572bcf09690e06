pub mod hub;
pub mod presence;
