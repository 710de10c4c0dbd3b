use serde::Deserialize;

use super::Notifier;
use crate::error::preview;

const SERVERCHAN_URL: &str = "https://sctapi.ftqq.com";
const TELEGRAM_URL: &str = "https://api.telegram.org";
const WECOM_URL: &str = "https://qyapi.weixin.qq.com";
const PUSHPLUS_URL: &str = "https://www.pushplus.plus";

/// Read a JSON reply and fail on a non-2xx status.
async fn read_reply<T: serde::de::DeserializeOwned>(
    channel: &str,
    resp: reqwest::Response,
) -> anyhow::Result<T> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("{channel}: could not read response body: {e}"))?;
    if !status.is_success() {
        anyhow::bail!("{channel}: server returned HTTP {status}: {}", preview(&text));
    }
    serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("{channel}: unexpected response: {e}: {}", preview(&text)))
}

#[derive(Deserialize)]
struct CodeReply {
    code: i64,
    #[serde(default, alias = "msg")]
    message: Option<String>,
}

/// ServerChan Turbo (`SENDKEY`).
pub struct ServerChan {
    http: reqwest::Client,
    base_url: String,
    sendkey: String,
}

impl ServerChan {
    pub fn new(http: reqwest::Client, sendkey: &str) -> Self {
        Self {
            http,
            base_url: SERVERCHAN_URL.to_string(),
            sendkey: sendkey.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for ServerChan {
    fn name(&self) -> &'static str {
        "serverchan"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/{}.send", self.base_url, self.sendkey);
        let resp = self
            .http
            .post(&url)
            .form(&[("title", title), ("desp", body)])
            .send()
            .await?;
        let reply: CodeReply = read_reply(self.name(), resp).await?;
        if reply.code != 0 {
            anyhow::bail!(
                "serverchan: code {}: {}",
                reply.code,
                reply.message.unwrap_or_default()
            );
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram bot (`TELEGRAM_BOT_TOKEN` + `TELEGRAM_CHAT_ID`).
pub struct Telegram {
    http: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl Telegram {
    pub fn new(http: reqwest::Client, token: &str, chat_id: &str) -> Self {
        Self {
            http,
            base_url: TELEGRAM_URL.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for Telegram {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": format!("{title}\n\n{body}"),
            }))
            .send()
            .await?;
        let reply: TelegramReply = read_reply(self.name(), resp).await?;
        if !reply.ok {
            anyhow::bail!("telegram: {}", reply.description.unwrap_or_default());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct WeComReply {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// WeCom group bot webhook (`WECOM_BOT_KEY`).
pub struct WeComBot {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl WeComBot {
    pub fn new(http: reqwest::Client, key: &str) -> Self {
        Self {
            http,
            base_url: WECOM_URL.to_string(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WeComBot {
    fn name(&self) -> &'static str {
        "wecom"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/cgi-bin/webhook/send", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.key.as_str())])
            .json(&serde_json::json!({
                "msgtype": "text",
                "text": { "content": format!("{title}\n\n{body}") },
            }))
            .send()
            .await?;
        let reply: WeComReply = read_reply(self.name(), resp).await?;
        if reply.errcode != 0 {
            anyhow::bail!("wecom: errcode {}: {}", reply.errcode, reply.errmsg);
        }
        Ok(())
    }
}

/// PushPlus (`PUSHPLUS_TOKEN`).
pub struct PushPlus {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PushPlus {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self {
            http,
            base_url: PUSHPLUS_URL.to_string(),
            token: token.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for PushPlus {
    fn name(&self) -> &'static str {
        "pushplus"
    }

    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/send", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "token": self.token,
                "title": title,
                "content": body,
                "template": "markdown",
            }))
            .send()
            .await?;
        let reply: CodeReply = read_reply(self.name(), resp).await?;
        if reply.code != 200 {
            anyhow::bail!(
                "pushplus: code {}: {}",
                reply.code,
                reply.message.unwrap_or_default()
            );
        }
        Ok(())
    }
}
