//! Locally tracked server state.
//!
//! Populated only by event handlers reacting to the broadcast stream:
//! `join`/`part`/`disconnect` maintain the roster, `player_list` rebuilds
//! it wholesale, and ban/pardon/op/de-op verbs carried in
//! `server_action`/`console_message` text maintain the ban and op sets.
//! This is a cache, not a source of truth; it may lag the real server.
//!
//! Player and ban lookups are case-insensitive (names are stored
//! lowercased); op membership is exact, matching the game's op list.

use std::collections::HashSet;

use mux_events::ParsedEvent;

#[derive(Debug, Clone, Default)]
pub struct RosterState {
    players: HashSet<String>,
    ops: HashSet<String>,
    banned_players: HashSet<String>,
    banned_ips: HashSet<String>,
}

impl RosterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one classified broadcast event into the cache.
    pub fn apply(&mut self, event: &ParsedEvent) {
        match event.name {
            "join" => {
                if let Some(player) = event.field("player") {
                    self.players.insert(player.to_lowercase());
                }
            }
            "part" | "disconnect" => {
                if let Some(player) = event.field("player") {
                    self.players.remove(&player.to_lowercase());
                }
            }
            "player_list" => {
                if let Some(list) = event.field("player_list") {
                    self.players = list
                        .split(',')
                        .map(|name| name.trim().to_lowercase())
                        .filter(|name| !name.is_empty())
                        .collect();
                }
            }
            "server_action" => self.apply_action(event.field("action")),
            "console_message" => self.apply_action(event.field("message")),
            _ => {}
        }
    }

    /// Ban/pardon/op verbs as the server prints them, e.g.
    /// `Banning Steve`, `Banning ip 10.0.0.7`, `Pardoning Steve`,
    /// `Opping Steve`, `De-opping Steve`.
    fn apply_action(&mut self, text: Option<&str>) {
        let Some(text) = text else { return };
        if let Some(ip) = text.strip_prefix("Banning ip ") {
            self.banned_ips.insert(ip.trim().to_string());
        } else if let Some(player) = text.strip_prefix("Banning ") {
            self.banned_players.insert(player.trim().to_lowercase());
        } else if let Some(ip) = text.strip_prefix("Pardoning ip ") {
            self.banned_ips.remove(ip.trim());
        } else if let Some(player) = text.strip_prefix("Pardoning ") {
            self.banned_players.remove(&player.trim().to_lowercase());
        } else if let Some(player) = text.strip_prefix("Opping ") {
            self.ops.insert(player.trim().to_string());
        } else if let Some(player) = text.strip_prefix("De-opping ") {
            self.ops.remove(player.trim());
        }
    }

    pub fn is_online(&self, player: &str) -> bool {
        self.players.contains(&player.to_lowercase())
    }

    pub fn is_banned_player(&self, player: &str) -> bool {
        self.banned_players.contains(&player.to_lowercase())
    }

    pub fn is_banned_ip(&self, ip: &str) -> bool {
        self.banned_ips.contains(ip)
    }

    pub fn is_op(&self, player: &str) -> bool {
        self.ops.contains(player)
    }

    pub fn online_count(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mux_events::classify;

    const TS: &str = "2024-01-01 00:00:00 [INFO]";

    fn event(line: &str) -> ParsedEvent {
        classify(&format!("{TS} {line}")).expect("line must classify")
    }

    #[test]
    fn join_and_part_maintain_the_roster() {
        let mut state = RosterState::new();
        state.apply(&event("Steve [/10.0.0.7:54321] logged in"));
        assert!(state.is_online("Steve"));
        assert!(state.is_online("steve"));

        state.apply(&event("Steve lost connection: disconnect.quitting"));
        assert!(!state.is_online("Steve"));
    }

    #[test]
    fn bare_address_part_leaves_roster_untouched() {
        let mut state = RosterState::new();
        state.apply(&event("Steve [/10.0.0.7:54321] logged in"));
        state.apply(&event("/10.0.0.9:1234 lost connection"));
        assert!(state.is_online("Steve"));
    }

    #[test]
    fn player_list_rebuilds_wholesale() {
        let mut state = RosterState::new();
        state.apply(&event("Ghost [/10.0.0.9:1234] logged in"));
        state.apply(&event("Connected players: Steve, Alex"));
        assert!(state.is_online("Steve"));
        assert!(state.is_online("alex"));
        assert!(!state.is_online("Ghost"));
        assert_eq!(state.online_count(), 2);
    }

    #[test]
    fn ban_verbs_maintain_ban_sets() {
        let mut state = RosterState::new();
        state.apply(&event("Steve: Banning Alex"));
        assert!(state.is_banned_player("alex"));

        state.apply(&event("[CONSOLE] Banning ip 10.0.0.7"));
        assert!(state.is_banned_ip("10.0.0.7"));

        state.apply(&event("Steve: Pardoning Alex"));
        assert!(!state.is_banned_player("Alex"));
        state.apply(&event("[CONSOLE] Pardoning ip 10.0.0.7"));
        assert!(!state.is_banned_ip("10.0.0.7"));
    }

    #[test]
    fn op_verbs_are_case_sensitive() {
        let mut state = RosterState::new();
        state.apply(&event("[CONSOLE] Opping Steve"));
        assert!(state.is_op("Steve"));
        assert!(!state.is_op("steve"));

        state.apply(&event("[CONSOLE] De-opping Steve"));
        assert!(!state.is_op("Steve"));
    }
}
