use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::commands::Dispatcher;
use crate::config::Config;
use crate::error::BotError;
use crate::events::{FollowEvent, FollowPoller, TwitchFollows};
use crate::irc::{parse_line, Connection, Line};
use crate::scheduler::{tasks, Scheduler};

/// Connect, serve the channel until the server hangs up, then stop.
///
/// With `reconnect_attempts` above zero the bot reconnects that many times
/// before giving up.
pub async fn run(config: Config) -> Result<()> {
    let dispatcher = Dispatcher::new(&config.commands);
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let mut scheduler = if config.events.follows_enabled() {
        let source = TwitchFollows::new(&config.api, &config.irc.channel, config.events.page_size)?;
        let scheduler = Scheduler::new().await?;
        tasks::register_follow_task(
            &scheduler,
            &config.events.poll_schedule,
            FollowPoller::new(source),
            events_tx,
        )
        .await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        info!("Follow events disabled");
        drop(events_tx);
        None
    };

    let mut reconnects = 0;
    loop {
        let mut conn = Connection::connect(&config.irc).await?;
        serve(&mut conn, &dispatcher, &config, &mut events).await?;

        if reconnects >= config.irc.reconnect_attempts {
            info!("Server closed the connection, shutting down");
            break;
        }
        reconnects += 1;
        warn!(
            "Server closed the connection, reconnecting in {}s (attempt {}/{})",
            config.irc.reconnect_delay_secs, reconnects, config.irc.reconnect_attempts
        );
        tokio::time::sleep(Duration::from_secs(config.irc.reconnect_delay_secs)).await;
    }

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }
    Ok(())
}

/// Drive one connected session until end of stream.
///
/// Inbound lines and follow events are handled on this task only, so every
/// write to the socket happens in order from a single place.
pub async fn serve<S>(
    conn: &mut Connection<S>,
    dispatcher: &Dispatcher,
    config: &Config,
    events: &mut UnboundedReceiver<FollowEvent>,
) -> Result<(), BotError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            line = conn.read_line() => {
                match line? {
                    Some(line) => handle_line(conn, dispatcher, &line).await?,
                    None => return Ok(()),
                }
            }
            Some(event) = events.recv() => {
                let message = config.format_follow_message(&event.display_names());
                conn.send_line(&message).await?;
            }
        }
    }
}

async fn handle_line<S>(conn: &mut Connection<S>, dispatcher: &Dispatcher, raw: &str) -> Result<(), BotError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match parse_line(raw) {
        Ok(Line::Ping(token)) => conn.pong(&token).await,
        Ok(Line::Privmsg(msg)) => {
            if msg.channel != conn.channel() {
                return Ok(());
            }
            for reply in dispatcher.dispatch(&msg) {
                conn.send_line(&reply).await?;
            }
            Ok(())
        }
        Ok(Line::Other(_)) => Ok(()),
        Err(e) => {
            debug!("Ignoring line: {}", e);
            Ok(())
        }
    }
}
