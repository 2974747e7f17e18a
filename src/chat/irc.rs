//! IRC line codec for Twitch chat (IRCv3 tags, prefix, command, params).
//!
//! ```text
//! @id=abc;display-name=Foo :foo!foo@foo.tmi.twitch.tv PRIVMSG #chan :hello there
//! └──────── tags ────────┘ └──────── prefix ────────┘ └command┘ └─────params─────┘
//! ```

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chat::types::{ChannelName, ChatMessage};

/// Password accepted by Twitch for anonymous, read-only sessions.
pub const ANONYMOUS_PASS: &str = "SCHMOOPIIE";

/// Capabilities requested on connect.
pub const CAPABILITIES: &str = "twitch.tv/tags twitch.tv/commands";

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a single line (without the trailing CRLF).
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut tags = HashMap::new();

        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, tail) = stripped.split_once(' ')?;
            for pair in raw_tags.split(';') {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                tags.insert(key.to_string(), unescape_tag(value));
            }
            rest = tail.trim_start();
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split_whitespace();
        let command = words.next()?.to_string();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    /// Nick portion of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    /// Channel named by the first parameter, if any.
    pub fn channel(&self) -> Option<&str> {
        self.params.first()?.strip_prefix('#')
    }

    /// Convert a `PRIVMSG` into a [`ChatMessage`].
    ///
    /// Username comes from the prefix nick (`anonymous` if absent) and the
    /// id from the `id` tag (current epoch millis if absent).
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        if self.command != "PRIVMSG" {
            return None;
        }
        let text = self.params.get(1)?.clone();
        let username = self
            .nick()
            .filter(|n| !n.is_empty())
            .unwrap_or("anonymous")
            .to_string();
        let id = self
            .tags
            .get("id")
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(epoch_millis);
        Some(ChatMessage { id, username, text })
    }
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn epoch_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}

/// Anonymous nick in the `justinfanNNNNN` form Twitch accepts without a token.
pub fn anonymous_nick() -> String {
    use rand::Rng;
    format!("justinfan{}", rand::thread_rng().gen_range(10_000..99_999))
}

pub fn cap_req() -> String {
    format!("CAP REQ :{CAPABILITIES}")
}

pub fn pass(password: &str) -> String {
    format!("PASS {password}")
}

pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

pub fn join(channel: &ChannelName) -> String {
    format!("JOIN {}", channel.irc())
}

pub fn part(channel: &ChannelName) -> String {
    format!("PART {}", channel.irc())
}

pub fn pong(params: &[String]) -> String {
    match params.last() {
        Some(token) => format!("PONG :{token}"),
        None => "PONG".to_string(),
    }
}
