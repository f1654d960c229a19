pub mod pyramid;

use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::{clamp_pyramid_size, CommandsConfig};
use crate::irc::ChatMessage;

/// Commands this build knows how to run.
pub const BUILTIN_COMMANDS: &[&str] = &["pyramid"];

/// Turns chat messages into outbound replies.
pub struct Dispatcher {
    prefix: String,
    enabled: HashSet<String>,
    pyramid_symbol: String,
    pyramid_size: usize,
}

impl Dispatcher {
    pub fn new(config: &CommandsConfig) -> Self {
        for name in &config.valid {
            if !BUILTIN_COMMANDS.contains(&name.as_str()) {
                warn!("Command '{}' is enabled but has no handler; ignoring it", name);
            }
        }

        let enabled: HashSet<String> = config
            .valid
            .iter()
            .filter(|name| BUILTIN_COMMANDS.contains(&name.as_str()))
            .cloned()
            .collect();
        info!("Commands enabled: {:?} (prefix '{}')", enabled, config.prefix);

        Self {
            prefix: config.prefix.clone(),
            enabled,
            pyramid_symbol: config.pyramid_symbol.clone(),
            pyramid_size: clamp_pyramid_size(config.pyramid_size),
        }
    }

    /// Split `!name arg1 arg2` into the command name and its arguments.
    fn parse_invocation<'a>(&self, text: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
        let rest = text.trim_end().strip_prefix(self.prefix.as_str())?;
        if rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut words = rest.split_whitespace();
        let name = words.next()?;
        Some((name, words.collect()))
    }

    /// Lines to post in reply to `msg`, in order. Empty when the message is
    /// not an enabled command.
    pub fn dispatch(&self, msg: &ChatMessage) -> Vec<String> {
        let Some((name, args)) = self.parse_invocation(&msg.text) else {
            return Vec::new();
        };
        if !self.enabled.contains(name) {
            return Vec::new();
        }

        info!("Command '{}' from {}: {:?}", name, msg.sender, args);
        match name {
            "pyramid" => pyramid::run(&msg.sender, &args, &self.pyramid_symbol, self.pyramid_size),
            _ => Vec::new(),
        }
    }
}
