//! Peer -> broker request lines.
//!
//! Post-authentication command grammar, one request per line:
//!
//! - `|cmd`       forward `cmd` (pipe stripped) to the child process
//! - `!key value` set shared-store `key` to `value`
//! - `?key`       get shared-store `key`
//! - `+secret`    (re)authenticate
//! - `-`          request disconnect
//! - `.close`     request disconnect (earlier protocol variant)
//! - `.time`      query broker start time
//! - anything else is forwarded to the child process verbatim

/// A parsed peer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Forward this line to the child process input.
    Forward(String),
    /// Set a shared-store key. The value is the raw token; decoding it is
    /// the store's concern.
    Set { key: String, value: String },
    /// Get a shared-store key.
    Get { key: String },
    /// (Re)authenticate with the given secret.
    Auth(String),
    /// Disconnect (`-`).
    Quit,
    /// Disconnect (`.close`).
    Close,
    /// Query broker start time.
    Time,
    /// Recognized prefix but missing a required token.
    Malformed,
}

/// Parse one trimmed request line.
pub fn parse_request(line: &str) -> Request {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix('|') {
        return Request::Forward(rest.to_string());
    }
    if let Some(rest) = line.strip_prefix('!') {
        return match rest.split_once(' ') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => Request::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => Request::Malformed,
        };
    }
    if let Some(rest) = line.strip_prefix('?') {
        let key = rest.trim();
        return if key.is_empty() {
            Request::Malformed
        } else {
            Request::Get {
                key: key.to_string(),
            }
        };
    }
    if let Some(rest) = line.strip_prefix('+') {
        return Request::Auth(rest.to_string());
    }

    match line {
        "-" => Request::Quit,
        ".close" => Request::Close,
        ".time" => Request::Time,
        _ => Request::Forward(line.to_string()),
    }
}
