use async_trait::async_trait;
use log::warn;
use std::time::Duration;
use thiserror::Error;

mod http;
mod keyword;

pub use http::HttpClassifier;
pub use keyword::KeywordClassifier;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("分类服务请求失败: {0}")]
    Request(#[from] reqwest::Error),
}

/// 问题标签分类器，失败不影响问题创建
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, title: &str, description: &str)
        -> Result<Vec<String>, ClassifierError>;
}

/// 关闭分类时使用
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(
        &self,
        _title: &str,
        _description: &str,
    ) -> Result<Vec<String>, ClassifierError> {
        Ok(Vec::new())
    }
}

/// 在限定时间内取标签，出错或超时都退化为空标签
pub async fn tags_for(
    classifier: &dyn Classifier,
    timeout: Duration,
    title: &str,
    description: &str,
) -> Vec<String> {
    match tokio::time::timeout(timeout, classifier.classify(title, description)).await {
        Ok(Ok(tags)) => tags,
        Ok(Err(e)) => {
            warn!("分类服务不可用: {}", e);
            Vec::new()
        }
        Err(_) => {
            warn!("分类服务超时 ({} 毫秒)", timeout.as_millis());
            Vec::new()
        }
    }
}
