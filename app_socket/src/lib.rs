pub mod handler;
pub mod manager;
pub mod protocol;
pub mod socket;
