pub mod channels;

use std::time::Duration;

use crate::config::PushConfig;
use channels::{PushPlus, ServerChan, Telegram, WeComBot};

const PUSH_TIMEOUT_SECS: u64 = 15;

/// Delivers the end-of-run digest somewhere a human will read it.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Prints the digest to stdout; used when no channel is configured or
/// pushing is disabled.
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        println!("{title}\n\n{body}");
        Ok(())
    }
}

/// Sends to every configured channel. A failing channel is reported on
/// stderr and does not stop the others.
pub struct MultiNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build the channel list from config, falling back to the console.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared HTTP client cannot be built.
    pub fn from_config(cfg: &PushConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("could not build push HTTP client: {e}"))?;
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(key) = &cfg.serverchan_sendkey {
            channels.push(Box::new(ServerChan::new(http.clone(), key)));
        }
        if let (Some(token), Some(chat_id)) = (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
            channels.push(Box::new(Telegram::new(http.clone(), token, chat_id)));
        }
        if let Some(key) = &cfg.wecom_bot_key {
            channels.push(Box::new(WeComBot::new(http.clone(), key)));
        }
        if let Some(token) = &cfg.pushplus_token {
            channels.push(Box::new(PushPlus::new(http, token)));
        }
        if channels.is_empty() {
            channels.push(Box::new(ConsoleNotifier));
        }
        Ok(Self::new(channels))
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for MultiNotifier {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let mut delivered = 0usize;
        for channel in &self.channels {
            match channel.send(title, body).await {
                Ok(()) => delivered += 1,
                Err(e) => eprintln!("[cloud189-checkin] push via {} failed: {e:#}", channel.name()),
            }
        }
        if delivered == 0 && !self.channels.is_empty() {
            anyhow::bail!("no push channel accepted the digest");
        }
        Ok(())
    }
}
