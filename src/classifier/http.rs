use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Classifier, ClassifierError};

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    tags: Vec<String>,
}

/// 调用外部分类服务的 `POST /classify`
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/classify", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Vec<String>, ClassifierError> {
        debug!("请求分类服务: {}", self.endpoint);
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { title, description })
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("分类服务返回 {}", resp.status());
            return Ok(Vec::new());
        }

        let body: ClassifyResponse = resp.json().await?;
        Ok(body.tags)
    }
}
