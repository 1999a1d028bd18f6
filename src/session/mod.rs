//! Session orchestration: input feeds and the decode loop.

mod core;
mod feed;


pub use self::core::{Conditions, DecodeSession, DecodeSummary};
pub use self::feed::{ByteFeed, TextFeed};
