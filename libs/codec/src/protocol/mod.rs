//! Protocol enumerations carried in the frame header

pub mod message_type;

pub use message_type::MessageType;
