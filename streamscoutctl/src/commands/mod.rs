pub mod classify;
pub mod discover;
