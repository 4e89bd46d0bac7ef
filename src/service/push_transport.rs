//! 推送通道
use crate::error::transport_error::TransportError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// data 里必须带的深链 key
pub const DEEP_LINK_KEY: &str = "screen";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>, screen: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert(DEEP_LINK_KEY.to_string(), screen.to_string());
        Self {
            title: title.into(),
            body: body.into(),
            data,
        }
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// 发给单个设备
    async fn send_to_token(&self, token: &str, message: &PushMessage) -> Result<(), TransportError>;

    /// 发给订阅了某个主题的所有设备
    async fn send_to_topic(&self, topic: &str, message: &PushMessage) -> Result<(), TransportError>;
}

/// 通过 HTTP 推送网关发送
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPushTransport {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, payload: serde_json::Value) -> Result<StatusCode, TransportError> {
        let response = self
            .client
            .post(format!("{}/send", self.endpoint))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(status);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send_to_token(&self, token: &str, message: &PushMessage) -> Result<(), TransportError> {
        let status = self
            .post(json!({
                "token": token,
                "notification": { "title": message.title, "body": message.body },
                "data": message.data,
            }))
            .await?;
        // 404 / 410 说明 token 已失效
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Unregistered(token.to_string()))
        }
    }

    async fn send_to_topic(&self, topic: &str, message: &PushMessage) -> Result<(), TransportError> {
        let status = self
            .post(json!({
                "topic": topic,
                "notification": { "title": message.title, "body": message.body },
                "data": message.data,
            }))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body: format!("topic {topic} not found"),
            })
        }
    }
}

/// 未配置推送网关时只打日志
pub struct LogPushTransport;

#[async_trait]
impl PushTransport for LogPushTransport {
    async fn send_to_token(&self, token: &str, message: &PushMessage) -> Result<(), TransportError> {
        tracing::info!("push(token) - token:{} | message:{:?}", token, message);
        Ok(())
    }

    async fn send_to_topic(&self, topic: &str, message: &PushMessage) -> Result<(), TransportError> {
        tracing::info!("push(topic) - topic:{} | message:{:?}", topic, message);
        Ok(())
    }
}
