mod messages;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use irc::client::{Client, ClientStream, Sender, data::Config};
use tracing::{info, warn};

use crate::config::IrcConfig;

pub use messages::{
    HOST_CHANGE_REASON, HostEvent, ITALIC, Outgoing, ctcp_action, format_action, is_channel,
    is_meaningful_departure, parse_ctcp_action,
};

/// Live IRC connection. Incoming protocol messages are lifted into
/// [`HostEvent`]s; everything else (PING, MOTD, ...) is handled by the client.
pub struct Bridge {
    client: Client,
    stream: ClientStream,
}

impl Bridge {
    pub async fn connect(config: &IrcConfig) -> Result<Self> {
        let irc_config = Config {
            nickname: Some(config.nickname.clone()),
            server: Some(config.server.clone()),
            port: Some(config.port),
            use_tls: Some(config.use_tls),
            channels: config.channels.clone(),
            ..Config::default()
        };

        let mut client = Client::from_config(irc_config)
            .await
            .with_context(|| format!("failed to connect to {}:{}", config.server, config.port))?;
        client.identify().context("failed to register with server")?;
        let stream = client.stream()?;
        info!(
            "Connected to {}:{} as {}",
            config.server, config.port, config.nickname
        );

        Ok(Self { client, stream })
    }

    pub fn current_nickname(&self) -> &str {
        self.client.current_nickname()
    }

    /// Next event the bot cares about, or `None` once the server hangs up.
    pub async fn next_event(&mut self) -> Result<Option<HostEvent>> {
        while let Some(message) = self.stream.next().await {
            let message = message.context("IRC read error")?;
            if let Some(event) = HostEvent::from_message(&message) {
                return Ok(Some(event));
            }
        }
        info!("IRC connection closed");
        Ok(None)
    }

    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            sender: self.client.sender(),
        }
    }
}

#[derive(Clone)]
pub struct BridgeHandle {
    sender: Sender,
}

impl BridgeHandle {
    /// Sends now, or schedules the line on its own task when it carries a delay.
    pub fn send(&self, message: Outgoing) -> Result<()> {
        match message.delay {
            None => self
                .sender
                .send_privmsg(&message.target, &message.text)
                .with_context(|| format!("failed to send to {}", message.target))?,
            Some(delay) => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = sender.send_privmsg(&message.target, &message.text) {
                        warn!(?err, target = %message.target, "Delayed send failed");
                    }
                });
            }
        }
        Ok(())
    }

    pub fn send_all(&self, messages: impl IntoIterator<Item = Outgoing>) {
        for message in messages {
            if let Err(err) = self.send(message) {
                warn!(?err, "Dropping outgoing line");
            }
        }
    }
}
