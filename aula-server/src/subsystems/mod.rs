pub mod catalog;
pub mod chat;
pub mod embedder;
pub mod history;
pub mod retrieve;
