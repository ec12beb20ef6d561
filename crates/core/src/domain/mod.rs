pub mod command;
pub mod member;
pub mod message;
pub mod routing;
