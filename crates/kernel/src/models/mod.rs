//! Data models for the forum kernel.

pub mod forum;

pub use forum::{Discussion, Forum, Post, User, forum_registry};
