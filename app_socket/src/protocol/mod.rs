pub mod socket_event;
