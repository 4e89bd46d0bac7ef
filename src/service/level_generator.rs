//! 外部关卡生成函数：种子 -> 关卡描述
use crate::error::transport_error::TransportError;
use crate::model::daily::LevelDescriptor;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LevelGenerator: Send + Sync {
    async fn generate_level(&self, seed: u64) -> Result<LevelDescriptor, TransportError>;
}

/// 调用关卡生成服务
pub struct HttpLevelGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpLevelGenerator {
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl LevelGenerator for HttpLevelGenerator {
    async fn generate_level(&self, seed: u64) -> Result<LevelDescriptor, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "seed": seed }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let descriptor: serde_json::Value = response
            .json()
            .await
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;
        if descriptor.is_null() {
            return Err(TransportError::InvalidResponse("empty level descriptor".to_string()));
        }
        Ok(LevelDescriptor(descriptor))
    }
}

/// 没有生成服务时只下发种子，由客户端按种子生成关卡
pub struct SeedOnlyLevelGenerator;

#[async_trait]
impl LevelGenerator for SeedOnlyLevelGenerator {
    async fn generate_level(&self, seed: u64) -> Result<LevelDescriptor, TransportError> {
        Ok(LevelDescriptor(json!({ "seed": seed })))
    }
}
