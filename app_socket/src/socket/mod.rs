pub mod fan_out;
pub mod socket_connection;
pub mod socket_server;
