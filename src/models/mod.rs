// src/models/mod.rs

pub mod question;
pub mod submission;
pub mod tryout;
pub mod user;
