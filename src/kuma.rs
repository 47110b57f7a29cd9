//! Uptime Kuma client over its Socket.IO API.

use crate::api::{ApiError, Capabilities, Credentials, MonitorApi};
use crate::config::Settings;
use crate::monitor::{Monitor, MonitorId, Tag};
use crate::socketio::{endpoint_for, Connection};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub struct KumaClient {
    endpoint: Url,
    timeout: Duration,
    resume_supported: Option<bool>,
    conn: Option<Connection>,
    server_version: Option<String>,
}

impl KumaClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        Ok(Self {
            endpoint: endpoint_for(&settings.url)?,
            timeout: settings.timeout,
            resume_supported: settings.resume_supported,
            conn: None,
            server_version: None,
        })
    }

    /// Version reported by the server's `info` push, once logged in.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    fn conn(&mut self) -> Result<&mut Connection, ApiError> {
        self.conn.as_mut().ok_or(ApiError::NotConnected)
    }

    /// Emit `event` and check the `{ok, msg}` envelope of the reply.
    async fn request(&mut self, event: &str, args: Vec<Value>) -> Result<Value, ApiError> {
        let reply = self.conn()?.call(event, args).await?;
        check_reply(event, reply)
    }
}

fn check_reply(operation: &str, reply: Value) -> Result<Value, ApiError> {
    match reply.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(reply),
        Some(false) => Err(ApiError::Rejected {
            operation: operation.to_string(),
            message: reply_message(&reply),
        }),
        None => Err(ApiError::protocol(operation, format!("no `ok` field in {reply}"))),
    }
}

fn reply_message(reply: &Value) -> String {
    reply
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string()
}

/// Decode a `monitorList` payload (an object keyed by monitor id) into a list
/// ordered by id, the order the server's own UI uses.
pub fn parse_monitor_list(payload: &Value) -> Result<Vec<Monitor>, ApiError> {
    let entries = payload
        .as_object()
        .ok_or_else(|| ApiError::protocol("monitorList", "payload is not an object"))?;
    let mut monitors = entries
        .values()
        .map(|entry| {
            serde_json::from_value::<Monitor>(entry.clone())
                .map_err(|e| ApiError::protocol("monitorList", e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    monitors.sort_by_key(|m| m.id);
    Ok(monitors)
}

fn parse_tags(reply: &Value) -> Result<Vec<Tag>, ApiError> {
    let tags = reply
        .get("monitor")
        .and_then(|m| m.get("tags"))
        .ok_or_else(|| ApiError::protocol("getMonitor", "reply has no monitor tags"))?;
    serde_json::from_value(tags.clone())
        .map_err(|e| ApiError::protocol("getMonitor", e.to_string()))
}

#[async_trait]
impl MonitorApi for KumaClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), ApiError> {
        if self.conn.is_none() {
            self.conn = Some(Connection::open(&self.endpoint, self.timeout).await?);
        }

        let reply = self
            .conn()?
            .call(
                "login",
                vec![json!({
                    "username": credentials.username,
                    "password": credentials.password,
                    "token": "",
                })],
            )
            .await?;

        if reply.get("tokenRequired").and_then(Value::as_bool) == Some(true) {
            return Err(ApiError::Login(
                "two-factor authentication token required".to_string(),
            ));
        }
        if reply.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ApiError::Login(reply_message(&reply)));
        }

        self.server_version = self
            .conn()?
            .last_event("info")
            .and_then(|args| args.first())
            .and_then(|info| info.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string);
        tracing::info!(
            user = %credentials.username,
            version = self.server_version().unwrap_or("unknown"),
            "logged in"
        );
        Ok(())
    }

    async fn list_monitors(&mut self) -> Result<Vec<Monitor>, ApiError> {
        let args = self.conn()?.event("monitorList").await?;
        let payload = args
            .first()
            .ok_or_else(|| ApiError::protocol("monitorList", "event carried no payload"))?;
        parse_monitor_list(payload)
    }

    async fn tags_for_monitor(&mut self, id: MonitorId) -> Result<Vec<Tag>, ApiError> {
        let reply = self.request("getMonitor", vec![json!(id)]).await?;
        parse_tags(&reply)
    }

    async fn pause_monitor(&mut self, id: MonitorId) -> Result<(), ApiError> {
        self.request("pauseMonitor", vec![json!(id)]).await?;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            resume: self.resume_supported.unwrap_or(true),
        }
    }

    async fn resume_monitor(&mut self, id: MonitorId) -> Result<(), ApiError> {
        if !self.capabilities().resume {
            return Err(ApiError::Unsupported("resume_monitor"));
        }
        self.request("resumeMonitor", vec![json!(id)]).await?;
        Ok(())
    }

    async fn edit_monitor(&mut self, monitor: &Monitor) -> Result<(), ApiError> {
        let payload = serde_json::to_value(monitor)
            .map_err(|e| ApiError::protocol("editMonitor", e.to_string()))?;
        self.request("editMonitor", vec![payload]).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ApiError> {
        match self.conn.take() {
            Some(conn) => {
                tracing::debug!("disconnecting");
                conn.close().await
            }
            None => Ok(()),
        }
    }
}
