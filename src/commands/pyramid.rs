use tracing::{debug, info};

use crate::config::{clamp_pyramid_size, MAX_PYRAMID_SIZE};

/// Build the pyramid requested by `!pyramid [symbol] [size]`.
///
/// A lone all-digit argument is the size (`!pyramid 4`). A missing symbol or
/// size falls back to the configured default, and so does a size that is not
/// a number. Any number is clamped into `1..=5`, however large.
pub fn run(sender: &str, args: &[&str], default_symbol: &str, default_size: usize) -> Vec<String> {
    let (symbol, size) = match args {
        [] => (default_symbol, None),
        [only] if only.chars().all(|c| c.is_ascii_digit()) => (default_symbol, parse_size(only)),
        [symbol] => (*symbol, None),
        [symbol, size, ..] => (*symbol, parse_size(size)),
    };
    let size = size.unwrap_or_else(|| clamp_pyramid_size(default_size as i64));

    // Twitch runs "/..." and "." lines as chat commands.
    let symbol = if symbol.starts_with(['/', '.']) {
        info!("{} asked for a pyramid of '{}', using '{}'", sender, symbol, default_symbol);
        default_symbol
    } else {
        symbol
    };

    debug!(
        "{} requested a pyramid with args [{}] (symbol={}, size={})",
        sender,
        args.join(","),
        symbol,
        size
    );
    build(symbol, size)
}

/// Clamped size for an integer argument, `None` when it is not an integer.
fn parse_size(raw: &str) -> Option<usize> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if negative {
        return Some(1);
    }
    Some(digits.parse::<i64>().map_or(MAX_PYRAMID_SIZE, clamp_pyramid_size))
}

/// Rows of `symbol` counting 1, 2, ..., size, ..., 2, 1.
pub fn build(symbol: &str, size: usize) -> Vec<String> {
    // Emotes need a space between repetitions to render; plain characters don't.
    let separator = if symbol.chars().count() > 1 { " " } else { "" };
    (1..size)
        .chain((1..=size).rev())
        .map(|count| vec![symbol; count].join(separator))
        .collect()
}
