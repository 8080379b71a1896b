pub mod commands;
pub mod handles;
pub mod memory;
pub mod transfer;
