//! Socket Mode listener meant to grow into an on-demand summarization bot.
//! It currently only acknowledges envelopes and logs the two triggers
//! (a summarize message and an added reaction); neither is wired to the
//! summarization path yet.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct Config {
    slack_app_token: String,
    trigger_phrase: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            slack_app_token: required_env("SLACK_APP_TOKEN")?,
            trigger_phrase: env::var("SHELF_TRIGGER_PHRASE")
                .unwrap_or_else(|_| "要約して".to_string()),
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} is not set"))
}

#[derive(Debug, Deserialize)]
struct SocketOpenResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    let config = Config::from_env()?;
    let client = HttpClient::builder()
        .user_agent(concat!("paper-letter-shelf-bot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")?;

    loop {
        if let Err(err) = run_socket_loop(&client, &config).await {
            warn!("socket loop error: {err}");
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn run_socket_loop(client: &HttpClient, config: &Config) -> Result<()> {
    let socket_url = open_socket_url(client, config).await?;
    let (ws_stream, _) = connect_async(socket_url)
        .await
        .context("connect slack socket")?;
    let (mut ws_write, mut ws_read) = ws_stream.split();
    info!("connected to slack socket mode");
    while let Some(message) = ws_read.next().await {
        let message = message.context("read slack socket message")?;
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        // Hello and disconnect frames carry no envelope_id; skip them.
        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let ack = json!({ "envelope_id": envelope.envelope_id }).to_string();
        ws_write
            .send(Message::Text(ack))
            .await
            .context("send slack ack")?;
        if envelope.envelope_type == "events_api" {
            handle_event(config, &envelope.payload);
        }
    }
    Ok(())
}

async fn open_socket_url(client: &HttpClient, config: &Config) -> Result<String> {
    let response = client
        .post("https://slack.com/api/apps.connections.open")
        .bearer_auth(&config.slack_app_token)
        .send()
        .await
        .context("request slack socket url")?;
    let payload = response.text().await.context("read slack socket response")?;
    let data: SocketOpenResponse =
        serde_json::from_str(&payload).context("parse slack socket response")?;
    if !data.ok {
        bail!(
            "slack apps.connections.open failed: {}",
            data.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    data.url
        .ok_or_else(|| anyhow::anyhow!("slack socket url missing"))
}

fn handle_event(config: &Config, payload: &serde_json::Value) {
    let event = match payload.get("event") {
        Some(event) => event,
        None => return,
    };
    let event_type = event
        .get("type")
        .and_then(|value| value.as_str())
        .unwrap_or("");
    match event_type {
        "message" => {
            // Ignore our own (and any other bot's) messages.
            if event.get("bot_id").is_some() {
                return;
            }
            let text = event
                .get("text")
                .and_then(|value| value.as_str())
                .unwrap_or("");
            if text.trim() == config.trigger_phrase {
                let channel = event
                    .get("channel")
                    .and_then(|value| value.as_str())
                    .unwrap_or("?");
                info!("summarize trigger received in {channel}; on-demand summarization is not wired up yet");
            }
        }
        "reaction_added" => {
            let reaction = event
                .get("reaction")
                .and_then(|value| value.as_str())
                .unwrap_or("?");
            info!("reaction :{reaction}: added; summarize-on-reaction is not wired up yet");
        }
        _ => {}
    }
}
