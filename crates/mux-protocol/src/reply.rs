//! Broker -> peer reply lines and banners.
//!
//! Status lines carry a `+`/`-` sign followed by either an HTTP-flavored
//! numeric code or a short human-readable banner:
//!
//! - `- Enter password`          challenge banner (secret configured)
//! - `+ Welcome`                 welcome banner (no secret)
//! - `+200` / `+403` / `+404` / `+503`
//! - `-200`                      goodbye (disconnect acknowledged)
//! - `+ Closing`                 goodbye (legacy `.close` variant)
//! - `+ Start time <secs>`       broker start time, unix seconds
//! - `!key <value>`              shared-store value

use std::fmt;

/// A broker reply. `Display` renders the exact wire line (no terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `- Enter password`
    Challenge,
    /// `+ Welcome`
    Welcome,
    /// `+200`
    Ok,
    /// `+403`
    Forbidden,
    /// `+404`
    NotFound,
    /// `+503`
    Malformed,
    /// `-200`
    Goodbye,
    /// `+ Closing`
    Closing,
    /// `+ Start time <secs>`
    StartTime(u64),
    /// `!key <serialized value>`
    Value { key: String, value: String },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Challenge => write!(f, "- Enter password"),
            Reply::Welcome => write!(f, "+ Welcome"),
            Reply::Ok => write!(f, "+200"),
            Reply::Forbidden => write!(f, "+403"),
            Reply::NotFound => write!(f, "+404"),
            Reply::Malformed => write!(f, "+503"),
            Reply::Goodbye => write!(f, "-200"),
            Reply::Closing => write!(f, "+ Closing"),
            Reply::StartTime(secs) => write!(f, "+ Start time {secs}"),
            Reply::Value { key, value } => write!(f, "!{key} {value}"),
        }
    }
}

impl Reply {
    /// Parse a reply line back into a `Reply` (client side).
    ///
    /// Lines that are not recognizable replies (i.e. broadcast child
    /// output) return `None`.
    pub fn parse(line: &str) -> Option<Reply> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            "- Enter password" => return Some(Reply::Challenge),
            "+ Welcome" => return Some(Reply::Welcome),
            "+200" => return Some(Reply::Ok),
            "+403" => return Some(Reply::Forbidden),
            "+404" => return Some(Reply::NotFound),
            "+503" => return Some(Reply::Malformed),
            "-200" => return Some(Reply::Goodbye),
            "+ Closing" => return Some(Reply::Closing),
            _ => {}
        }
        if let Some(rest) = line.strip_prefix("+ Start time ") {
            return rest.parse().ok().map(Reply::StartTime);
        }
        if let Some(rest) = line.strip_prefix('!') {
            if let Some((key, value)) = rest.split_once(' ') {
                if !key.is_empty() {
                    return Some(Reply::Value {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        None
    }

    /// True for the challenge banner (any leading-`-` banner line).
    pub fn is_challenge(line: &str) -> bool {
        matches!(Reply::parse(line), Some(Reply::Challenge))
    }

    /// True when the line denies an authentication attempt.
    pub fn is_denied(line: &str) -> bool {
        matches!(Reply::parse(line), Some(Reply::Forbidden))
    }
}
