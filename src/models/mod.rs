//! Domain model module declarations.

pub mod message;
