// src/services/mod.rs

pub mod grading;
pub mod question;
pub mod submission;
pub mod tryout;
