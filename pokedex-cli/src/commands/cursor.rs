//! Cursor inspection: encode offsets and decode cursors seen in responses

use anyhow::Result;
use clap::{Parser, Subcommand};
use pokedex_core::cursor;

#[derive(Parser, Debug)]
pub struct CursorArgs {
    #[command(subcommand)]
    pub command: CursorCommands,
}

#[derive(Subcommand, Debug)]
pub enum CursorCommands {
    /// Encode a zero-based offset as a cursor
    Encode {
        /// Offset into the collection
        #[arg(value_parser = clap::value_parser!(i64).range(0..))]
        offset: i64,
    },
    /// Decode a cursor to its offset (prints "invalid" for malformed cursors)
    Decode {
        /// Cursor string
        cursor: String,
    },
}

fn render(command: &CursorCommands) -> String {
    match command {
        CursorCommands::Encode { offset } => cursor::encode(*offset),
        CursorCommands::Decode { cursor: text } => match cursor::decode(text) {
            Some(offset) => offset.to_string(),
            None => "invalid".to_owned(),
        },
    }
}

pub fn run_cursor(args: CursorArgs) -> Result<()> {
    println!("{}", render(&args.command));
    Ok(())
}
