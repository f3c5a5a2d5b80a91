pub mod catalog;
pub mod error;
pub mod participant;
pub mod protocol;
pub mod room;
