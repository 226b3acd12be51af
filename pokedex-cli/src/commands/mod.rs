//! Command implementations for the pokedex CLI

pub mod cursor;
pub mod serve;

pub use cursor::run_cursor;
pub use serve::run_serve;
