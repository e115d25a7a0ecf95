use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    #[serde(rename = "id")]
    ById,
    #[serde(rename = "class")]
    ByClassName,
    #[serde(rename = "path")]
    ByPath,
}

/// How to find the article container again on a later visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLocator {
    #[serde(rename = "method", default)]
    pub strategy: Vec<LocatorStrategy>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "class", default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<usize>>,
}

impl ContainerLocator {
    pub fn is_empty(&self) -> bool {
        self.strategy.is_empty()
    }
}

/// Article metadata as stored, keyed by [`crate::sync::store::article_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub id: String,
    pub element: ContainerLocator,
    pub title: String,
    pub author: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    pub paragraphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
}

/// A freshly extracted article, as sent by `sendArticleContent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSubmission {
    pub element: ContainerLocator,
    pub url: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub paragraphs: Vec<String>,
}

/// Requests from a page session to the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    CheckArticleContent {
        url: String,
    },
    SendArticleContent(ArticleSubmission),
    ColorUpdate {
        color: String,
    },
    SaveArticleColors {
        url: String,
        colors: Vec<String>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CheckArticleContent { .. } => "checkArticleContent",
            Self::SendArticleContent(_) => "sendArticleContent",
            Self::ColorUpdate { .. } => "colorUpdate",
            Self::SaveArticleColors { .. } => "saveArticleColors",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedArticle {
    pub element: ContainerLocator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckArticleResponse {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<CachedArticle>,
}

/// Acknowledgement for submissions and colour messages. The field name is
/// part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub recieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceivedResponse {
    pub fn ok() -> Self {
        Self {
            recieved: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            recieved: false,
            error: Some(error.into()),
        }
    }
}
