//! Lichess API integration

mod client;
mod types;

pub use client::{ArchivePage, LichessClient};
pub use types::*;
