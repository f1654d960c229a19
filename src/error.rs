use thiserror::Error;

/// Failure classes of the bot.
///
/// Only configuration, connection and write failures stop the process.
/// Poll and parse failures are logged and the bot carries on.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write to chat server failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("follow poll failed: {0}")]
    Poll(String),

    #[error("malformed line: {0}")]
    Parse(String),
}

impl BotError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::Config(_) | BotError::Connection { .. } | BotError::Write(_)
        )
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Poll(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
