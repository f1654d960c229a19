use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::config::IrcConfig;
use crate::error::{BotError, Result};
use crate::irc::LineCodec;

/// One chat session bound to a single channel.
pub struct Connection<S> {
    framed: Framed<S, LineCodec>,
    channel: String,
    addr: String,
}

impl Connection<TcpStream> {
    /// Open the TCP socket and log in.
    pub async fn connect(config: &IrcConfig) -> Result<Self> {
        let addr = config.address();
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| BotError::Connection {
                addr: addr.clone(),
                source,
            })?;
        Self::login(stream, addr, config).await
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send `PASS`, `NICK` and `JOIN` over an already open stream.
    pub async fn login(stream: S, addr: String, config: &IrcConfig) -> Result<Self> {
        let mut conn = Self {
            framed: Framed::new(stream, LineCodec::new()),
            channel: config.channel.clone(),
            addr,
        };

        debug!(">> PASS oauth:***");
        conn.framed
            .feed(format!("PASS {}", config.token))
            .await
            .map_err(BotError::Write)?;
        conn.send_raw(format!("NICK {}", config.bot_name)).await?;
        conn.send_raw(format!("JOIN #{}", config.channel)).await?;

        info!("Joined #{} as {}", config.channel, config.bot_name);
        Ok(conn)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next line. `Ok(None)` means the server closed the socket.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                debug!("<< {}", line);
                Ok(Some(line))
            }
            Some(Err(source)) => Err(BotError::Connection {
                addr: self.addr.clone(),
                source,
            }),
            None => Ok(None),
        }
    }

    /// Post `text` to the joined channel.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.send_raw(format!("PRIVMSG #{} :{}", self.channel, text))
            .await
    }

    pub async fn pong(&mut self, token: &str) -> Result<()> {
        self.send_raw(format!("PONG :{}", token)).await
    }

    async fn send_raw(&mut self, line: String) -> Result<()> {
        debug!(">> {}", line);
        self.framed.send(line).await.map_err(BotError::Write)
    }
}
