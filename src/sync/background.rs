//! Host-shell side of the message contract: answers page sessions against an
//! [`ArticleStore`].

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::formats::{
    ArticleRecord, ArticleSubmission, CachedArticle, CheckArticleResponse, Message,
    ReceivedResponse,
};
use crate::metadata::parse_publication_date;
use crate::sync::store::{ArticleStore, ColorUpdate, article_key};

pub struct Background {
    store: Arc<dyn ArticleStore>,
    current_color: RwLock<Option<String>>,
}

impl Background {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            current_color: RwLock::new(None),
        }
    }

    /// Colour of the paragraph most recently reported as the reading position.
    pub async fn current_color(&self) -> Option<String> {
        self.current_color.read().await.clone()
    }

    /// Answers one message. Only lookups fail outright; write failures are
    /// reported in the acknowledgement.
    pub async fn handle(&self, message: Message) -> anyhow::Result<serde_json::Value> {
        tracing::debug!(kind = message.kind(), "handling message");
        let response = match message {
            Message::CheckArticleContent { url } => {
                serde_json::to_value(self.check_article(&url).await?)?
            }
            Message::SendArticleContent(submission) => {
                serde_json::to_value(self.store_article(submission).await)?
            }
            Message::ColorUpdate { color } => {
                tracing::info!(%color, "reading position colour changed");
                *self.current_color.write().await = Some(color);
                serde_json::to_value(ReceivedResponse::ok())?
            }
            Message::SaveArticleColors { url, colors } => {
                serde_json::to_value(self.save_colors(&url, colors).await)?
            }
        };
        Ok(response)
    }

    async fn check_article(&self, url: &str) -> anyhow::Result<CheckArticleResponse> {
        let record = self.store.get(&article_key(url)).await?;
        Ok(CheckArticleResponse {
            exists: record.is_some(),
            article: record.map(|record| CachedArticle {
                element: record.element,
                colors: record.colors,
                paragraphs: record.paragraphs,
            }),
        })
    }

    async fn store_article(&self, submission: ArticleSubmission) -> ReceivedResponse {
        let record = ArticleRecord {
            id: article_key(&submission.url),
            published_at: parse_publication_date(&submission.date),
            element: submission.element,
            title: submission.title,
            author: submission.author,
            date: submission.date,
            url: submission.url,
            paragraphs: submission.paragraphs,
            colors: None,
        };
        match self.store.create(&record).await {
            Ok(true) => {
                tracing::info!(
                    url = %record.url,
                    paragraphs = record.paragraphs.len(),
                    "stored article"
                );
                ReceivedResponse::ok()
            }
            Ok(false) => {
                tracing::debug!(url = %record.url, "article already stored; keeping first record");
                ReceivedResponse::ok()
            }
            Err(err) => {
                tracing::warn!(
                    url = %record.url,
                    error = %format!("{err:#}"),
                    "failed to store article"
                );
                ReceivedResponse::failed(format!("{err:#}"))
            }
        }
    }

    async fn save_colors(&self, url: &str, colors: Vec<String>) -> ReceivedResponse {
        match self.store.update_colors(&article_key(url), colors).await {
            Ok(ColorUpdate::Saved) => ReceivedResponse::ok(),
            Ok(ColorUpdate::Missing) => {
                ReceivedResponse::failed(format!("no article stored for {url}"))
            }
            Ok(ColorUpdate::LengthMismatch { paragraphs, colors }) => {
                tracing::warn!(%url, paragraphs, colors, "colour count does not match paragraphs");
                ReceivedResponse::failed(format!(
                    "{colors} colours for {paragraphs} stored paragraphs"
                ))
            }
            Err(err) => {
                tracing::warn!(%url, error = %format!("{err:#}"), "failed to save colours");
                ReceivedResponse::failed(format!("{err:#}"))
            }
        }
    }
}

/// HTTP face of [`Background`]: `POST /messages` and `GET /healthz`.
pub fn router(background: Arc<Background>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/messages", post(handle_message))
        .layer(TraceLayer::new_for_http())
        .with_state(background)
}

async fn handle_message(
    State(background): State<Arc<Background>>,
    Json(message): Json<Message>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    background
        .handle(message)
        .await
        .map(Json)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))
}
