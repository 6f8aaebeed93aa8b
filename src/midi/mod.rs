pub mod message;
pub mod monitor;
pub mod transport;
