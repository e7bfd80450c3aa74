//! Line classification and handler dispatch.
//!
//! `classify` is the pure half: walk the table in order, return the first
//! event whose pattern matches, with named capture groups collected into a
//! field map. `Dispatcher` layers a handler registry on top: one handler
//! per event name (absence is defined behavior and silently skipped) plus a
//! raw fallback that fires exactly once for every line, whether or not a
//! named event also fired.

use std::collections::HashMap;

use crate::table::event_table;

/// A classified log line: event name plus extracted fields.
///
/// Fields come from named capture groups; optional groups that did not
/// participate in the match are omitted from the map, not coerced to "".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub name: &'static str,
    pub fields: HashMap<String, String>,
}

impl ParsedEvent {
    /// Convenience accessor for a single field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Classify a raw line against the event table.
///
/// The line is trimmed first. Within a multi-pattern event the first
/// matching alternative wins; across events the first matching event wins
/// and the walk stops.
pub fn classify(line: &str) -> Option<ParsedEvent> {
    let line = line.trim();
    for def in event_table() {
        for pattern in &def.patterns {
            if let Some(caps) = pattern.captures(line) {
                let mut fields = HashMap::new();
                for group in pattern.capture_names().flatten() {
                    if let Some(m) = caps.name(group) {
                        fields.insert(group.to_string(), m.as_str().to_string());
                    }
                }
                return Some(ParsedEvent {
                    name: def.name,
                    fields,
                });
            }
        }
    }
    None
}

type Handler = Box<dyn FnMut(&ParsedEvent) + Send>;
type RawHandler = Box<dyn FnMut(&str) + Send>;

/// Event-name -> handler registry, populated at startup.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
    raw: Option<RawHandler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for one event name, replacing any previous one.
    ///
    /// `name` must be a name from the event table; registering a name the
    /// table never produces is harmless (the handler just never fires).
    pub fn on<F>(&mut self, name: &'static str, handler: F)
    where
        F: FnMut(&ParsedEvent) + Send + 'static,
    {
        self.handlers.insert(name, Box::new(handler));
    }

    /// Register the raw-line fallback.
    pub fn on_raw<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.raw = Some(Box::new(handler));
    }

    /// Classify `line` and invoke handlers.
    ///
    /// The named handler (if any, and if registered) runs first; the raw
    /// handler then runs exactly once with the trimmed line regardless.
    /// Returns the classification so callers can layer their own state
    /// updates on top.
    pub fn dispatch(&mut self, line: &str) -> Option<ParsedEvent> {
        let trimmed = line.trim();
        let parsed = classify(trimmed);
        if let Some(ref event) = parsed {
            if let Some(handler) = self.handlers.get_mut(event.name) {
                handler(event);
            }
        }
        if let Some(raw) = self.raw.as_mut() {
            raw(trimmed);
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TS: &str = "2024-01-01 00:00:00 [INFO]";

    #[test]
    fn chat_message_is_deterministic() {
        let event = classify(&format!("{TS} <Steve> hello")).expect("must classify");
        assert_eq!(event.name, "chat_message");
        assert_eq!(event.field("player"), Some("Steve"));
        assert_eq!(event.field("message"), Some("hello"));
        assert_eq!(event.field("log_level"), Some("INFO"));
    }

    #[test]
    fn tell_extracts_both_players() {
        let event =
            classify(&format!("{TS} §7Steve whispers follow me to Alex")).expect("must classify");
        assert_eq!(event.name, "tell");
        assert_eq!(event.field("src_player"), Some("Steve"));
        assert_eq!(event.field("dest_player"), Some("Alex"));
        assert_eq!(event.field("message"), Some("follow me"));
    }

    #[test]
    fn join_extracts_address() {
        let event =
            classify(&format!("{TS} Steve [/10.0.0.7:54321] logged in")).expect("must classify");
        assert_eq!(event.name, "join");
        assert_eq!(event.field("player"), Some("Steve"));
        assert_eq!(event.field("ip_address"), Some("10.0.0.7"));
        assert_eq!(event.field("port"), Some("54321"));
    }

    #[test]
    fn part_named_player_form() {
        let event =
            classify(&format!("{TS} Steve lost connection: disconnect.quitting"))
                .expect("must classify");
        assert_eq!(event.name, "part");
        assert_eq!(event.field("player"), Some("Steve"));
        assert_eq!(event.field("reason"), Some("disconnect.quitting"));
    }

    #[test]
    fn part_bare_address_form_uses_second_alternative() {
        let event =
            classify(&format!("{TS} /10.0.0.7:54321 lost connection")).expect("must classify");
        assert_eq!(event.name, "part");
        assert_eq!(event.field("player"), None);
        assert_eq!(event.field("ip_address"), Some("10.0.0.7"));
    }

    #[test]
    fn disconnect_both_shapes() {
        let named = classify(&format!(
            "{TS} Disconnecting Steve [/10.0.0.7:54321]: banned"
        ))
        .expect("must classify");
        assert_eq!(named.name, "disconnect");
        assert_eq!(named.field("player"), Some("Steve"));
        assert_eq!(named.field("reason"), Some("banned"));

        let bare =
            classify(&format!("{TS} Disconnecting /10.0.0.7:54321: flooding")).expect("must classify");
        assert_eq!(bare.name, "disconnect");
        assert_eq!(bare.field("player"), None);
        assert_eq!(bare.field("reason"), Some("flooding"));
    }

    #[test]
    fn command_without_args_omits_the_field() {
        let event =
            classify(&format!("{TS} Steve issued server command: home")).expect("must classify");
        assert_eq!(event.name, "command");
        assert_eq!(event.field("command"), Some("home"));
        assert_eq!(event.field("args"), None);

        let with_args = classify(&format!("{TS} Steve issued server command: tp Alex"))
            .expect("must classify");
        assert_eq!(with_args.field("args"), Some("Alex"));
    }

    #[test]
    fn specific_events_beat_the_generic_catch_all() {
        // "Steve: waves" only fits server_action; but a player-list line
        // must never be swallowed by it.
        let action = classify(&format!("{TS} Steve: waves")).expect("must classify");
        assert_eq!(action.name, "server_action");

        let list = classify(&format!("{TS} Connected players: Steve, Alex")).expect("must classify");
        assert_eq!(list.name, "player_list");
        assert_eq!(list.field("player_list"), Some("Steve, Alex"));
    }

    #[test]
    fn unclassified_line_returns_none() {
        assert!(classify("no timestamp at all").is_none());
    }

    #[test]
    fn raw_fires_once_even_when_a_named_event_matches() {
        let named = Arc::new(AtomicUsize::new(0));
        let raw = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::new();
        {
            let named = named.clone();
            dispatcher.on("chat_message", move |event| {
                assert_eq!(event.field("player"), Some("Steve"));
                named.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let raw = raw.clone();
            dispatcher.on_raw(move |_| {
                raw.fetch_add(1, Ordering::SeqCst);
            });
        }

        dispatcher.dispatch(&format!("{TS} <Steve> hello"));
        assert_eq!(named.load(Ordering::SeqCst), 1);
        assert_eq!(raw.load(Ordering::SeqCst), 1);

        // No named event here: only raw fires.
        dispatcher.dispatch("garbage line");
        assert_eq!(named.load(Ordering::SeqCst), 1);
        assert_eq!(raw.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_handler_is_silently_skipped() {
        let mut dispatcher = Dispatcher::new();
        // No handlers registered at all; must not panic.
        let parsed = dispatcher.dispatch(&format!("{TS} <Steve> hello"));
        assert_eq!(parsed.unwrap().name, "chat_message");
    }
}
