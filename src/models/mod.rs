// src/models/mod.rs

pub mod activity;
pub mod comment;
pub mod post;
pub mod user;
