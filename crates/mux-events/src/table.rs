//! The ordered event pattern table.
//!
//! Every log line the game server emits is prefixed with a timestamp and a
//! level token:
//!
//! `2024-01-01 00:00:00 [INFO] <Steve> hello`
//!
//! Each entry names one logical event and carries one or more patterns; an
//! entry with several patterns is a disjunction over the textual shapes of
//! the *same* event (e.g. `part` has a named-player form and a bare-address
//! form). Table order is load-bearing: the generic `server_action`
//! ("source: action") entry would swallow lines belonging to more specific
//! events, so it must stay last. `classify` walks the table top to bottom
//! and stops at the first match.

use once_cell::sync::Lazy;
use regex::Regex;

/// One named event and its alternative textual shapes, in priority order.
pub struct EventDef {
    pub name: &'static str,
    pub patterns: Vec<Regex>,
}

/// Timestamp + level prefix shared by every line shape.
const LINE_PREFIX: &str =
    r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(?P<log_level>[A-Z]+)\] ";

/// Player names are a restricted, case-sensitive token class.
const PLAYER: &str = r"[A-Za-z0-9_-]+";

/// Dotted-quad IPv4 plus a numeric port.
const IP: &str = r"(?:\d{1,3}\.){3}\d{1,3}";
const PORT: &str = r"\d{1,5}";

fn pattern(body: &str) -> Regex {
    let full = format!("{LINE_PREFIX}{body}$");
    Regex::new(&full).expect("event pattern must compile")
}

fn def(name: &'static str, bodies: &[String]) -> EventDef {
    EventDef {
        name,
        patterns: bodies.iter().map(|b| pattern(b)).collect(),
    }
}

static EVENT_TABLE: Lazy<Vec<EventDef>> = Lazy::new(|| {
    vec![
        def(
            "tell",
            &[format!(
                "§7(?P<src_player>{PLAYER}) whispers (?P<message>.*) to (?P<dest_player>{PLAYER})"
            )],
        ),
        def(
            "chat_message",
            &[format!(r"<(?P<player>{PLAYER})> (?P<message>.*)")],
        ),
        def(
            "console_message",
            &[format!(r"\[CONSOLE\] (?P<message>.*)")],
        ),
        def(
            "command",
            &[format!(
                r"(?P<player>{PLAYER}) issued server command: (?P<command>[A-Za-z-]+)(?: (?P<args>.*))?"
            )],
        ),
        def(
            "failed_command",
            &[format!(
                r"(?P<player>{PLAYER}) tried command: (?P<command>[A-Za-z-]+)(?: (?P<args>.*))?"
            )],
        ),
        def(
            "join",
            &[format!(
                r"(?P<player>{PLAYER}) \[/(?P<ip_address>{IP}):(?P<port>{PORT})\] logged in"
            )],
        ),
        def(
            "part",
            &[
                format!(r"(?P<player>{PLAYER}) lost connection: (?P<reason>.*)"),
                format!(r"/(?P<ip_address>{IP}):(?P<port>{PORT}) lost connection"),
            ],
        ),
        def(
            "disconnect",
            &[
                format!(
                    r"Disconnecting (?P<player>{PLAYER}) \[/(?P<ip_address>{IP}):(?P<port>{PORT})\]: (?P<reason>.*)"
                ),
                format!(
                    r"Disconnecting /(?P<ip_address>{IP}):(?P<port>{PORT}): (?P<reason>.*)"
                ),
            ],
        ),
        def("home", &[format!(r"(?P<player>{PLAYER}) returned home")]),
        def(
            "player_list",
            &[format!(r"Connected players: ?(?P<player_list>.*)")],
        ),
        // Generic "source: action" catch-all. Keep this last.
        def(
            "server_action",
            &[format!(r"(?P<source>{PLAYER}): (?P<action>.*)")],
        ),
    ]
});

/// The event table, built once on first use.
pub fn event_table() -> &'static [EventDef] {
    &EVENT_TABLE
}
