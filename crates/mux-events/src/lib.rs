//! mux-events
//!
//! Pure log-line classification logic:
//! - the ordered pattern table (one entry per named event)
//! - `classify`: raw line -> first matching `ParsedEvent`
//! - `Dispatcher`: event-name -> handler registry with a raw fallback

pub mod table;
pub mod dispatch;

pub use table::{event_table, EventDef};
pub use dispatch::{classify, Dispatcher, ParsedEvent};
