pub mod codec;
pub mod connection;

pub use codec::LineCodec;
pub use connection::Connection;

use crate::error::{BotError, Result};

/// A chat message posted in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    /// Channel name without the leading `#`
    pub channel: String,
    pub text: String,
}

/// What the bot cares about in one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `PING :<token>`; must be answered with `PONG :<token>`
    Ping(String),
    Privmsg(ChatMessage),
    /// Any other command (numerics, JOIN, CAP, ...)
    Other(String),
}

/// Parse one line (without its CR-LF terminator).
///
/// Lines that are not PING or PRIVMSG come back as [`Line::Other`]. A PRIVMSG
/// missing its sender, channel or text is a [`BotError::Parse`].
pub fn parse_line(raw: &str) -> Result<Line> {
    let mut rest = raw.trim_end_matches(['\r', '\n']);

    // Twitch IRCv3 tags: "@badge-info=;color=#FF0000 :nick!..."
    if rest.starts_with('@') {
        rest = match rest.split_once(' ') {
            Some((_, after)) => after.trim_start(),
            None => return Err(BotError::Parse(raw.to_string())),
        };
    }

    let prefix = match rest.strip_prefix(':') {
        Some(stripped) => {
            let (prefix, after) = stripped
                .split_once(' ')
                .ok_or_else(|| BotError::Parse(raw.to_string()))?;
            rest = after.trim_start();
            Some(prefix)
        }
        None => None,
    };

    let (command, params) = rest.split_once(' ').unwrap_or((rest, ""));

    match command {
        "PING" => {
            let token = params.strip_prefix(':').unwrap_or(params);
            Ok(Line::Ping(token.to_string()))
        }
        "PRIVMSG" => {
            let sender = prefix
                .and_then(|p| p.split_once('!'))
                .map(|(nick, _)| nick)
                .filter(|nick| !nick.is_empty())
                .ok_or_else(|| BotError::Parse(raw.to_string()))?;
            let (target, text) = params
                .split_once(" :")
                .ok_or_else(|| BotError::Parse(raw.to_string()))?;
            let channel = target.trim().trim_start_matches('#');
            if channel.is_empty() {
                return Err(BotError::Parse(raw.to_string()));
            }
            Ok(Line::Privmsg(ChatMessage {
                sender: sender.to_string(),
                channel: channel.to_string(),
                text: text.to_string(),
            }))
        }
        other => Ok(Line::Other(other.to_string())),
    }
}
