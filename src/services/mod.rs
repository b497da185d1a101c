// src/services/mod.rs

pub mod activity;
pub mod comments;
pub mod feed;
pub mod mention;
pub mod moderation;
pub mod tree;
