pub mod job_manager;
pub mod socket_error;
pub mod socket_manager;
