//! Route modules for the file store server

pub mod files;
pub mod health;
pub mod token;
