pub mod message_entity;
pub mod message_view;
pub mod participant_entity;
