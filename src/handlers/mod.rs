// src/handlers/mod.rs

pub mod auth;
pub mod questions;
pub mod submissions;
pub mod tryouts;
pub mod users;
