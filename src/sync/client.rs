use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::formats::{ArticleSubmission, CachedArticle, Message, ReceivedResponse};
use crate::sync::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(CachedArticle),
    Miss,
    /// The page went away before the store answered.
    Cancelled,
}

struct Outgoing {
    message: Message,
    delivered: oneshot::Sender<()>,
}

/// Page-side protocol client. Only the lookup is awaited; everything else is
/// queued to one background worker, delivered in call order and only logged.
#[derive(Clone)]
pub struct SyncClient {
    transport: Arc<dyn Transport>,
    outbox: mpsc::UnboundedSender<Outgoing>,
}

impl SyncClient {
    /// Must be called inside a Tokio runtime; the delivery worker is spawned here
    /// and stops once every clone of the client is dropped.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (outbox, queue) = mpsc::unbounded_channel();
        tokio::spawn(deliver_in_order(Arc::clone(&transport), queue));
        Self { transport, outbox }
    }

    pub async fn lookup(&self, url: &str, cancel: &CancellationToken) -> Lookup {
        let message = Message::CheckArticleContent {
            url: url.to_string(),
        };
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%url, "article lookup cancelled");
                return Lookup::Cancelled;
            }
            response = self.transport.send(message) => response,
        };

        match response {
            Ok(value) => interpret_lookup(url, value),
            Err(err) => {
                tracing::warn!(
                    %url,
                    error = %format!("{err:#}"),
                    "article lookup failed; treating as not cached"
                );
                Lookup::Miss
            }
        }
    }

    pub fn submit(&self, submission: ArticleSubmission) -> JoinHandle<()> {
        self.send_in_background(Message::SendArticleContent(submission))
    }

    pub fn report_color(&self, color: &str) -> JoinHandle<()> {
        self.send_in_background(Message::ColorUpdate {
            color: color.to_string(),
        })
    }

    pub fn save_colors(&self, url: &str, colors: Vec<String>) -> JoinHandle<()> {
        self.send_in_background(Message::SaveArticleColors {
            url: url.to_string(),
            colors,
        })
    }

    /// Queues `message` behind everything sent before it. The handle resolves
    /// once the message has been delivered or given up on.
    fn send_in_background(&self, message: Message) -> JoinHandle<()> {
        let kind = message.kind();
        let (delivered, done) = oneshot::channel();
        if self.outbox.send(Outgoing { message, delivered }).is_err() {
            tracing::warn!(kind, "delivery worker stopped; message dropped");
        }
        tokio::spawn(async move {
            let _ = done.await;
        })
    }
}

async fn deliver_in_order(
    transport: Arc<dyn Transport>,
    mut queue: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(Outgoing { message, delivered }) = queue.recv().await {
        deliver(transport.as_ref(), message).await;
        let _ = delivered.send(());
    }
}

async fn deliver(transport: &dyn Transport, message: Message) {
    let kind = message.kind();
    match transport.send(message).await {
        Ok(value) => match serde_json::from_value::<ReceivedResponse>(value) {
            Ok(ack) if ack.recieved => tracing::debug!(kind, "message acknowledged"),
            Ok(ack) => tracing::warn!(kind, error = ?ack.error, "message rejected"),
            Err(err) => tracing::warn!(kind, error = %err, "malformed acknowledgement"),
        },
        Err(err) => {
            tracing::warn!(kind, error = %format!("{err:#}"), "message not delivered")
        }
    }
}

fn interpret_lookup(url: &str, value: serde_json::Value) -> Lookup {
    let Some(exists) = value.get("exists").and_then(serde_json::Value::as_bool) else {
        tracing::warn!(%url, "lookup response has no existence flag; treating as not cached");
        return Lookup::Miss;
    };
    if !exists {
        tracing::debug!(%url, "article not cached");
        return Lookup::Miss;
    }

    let article = value
        .get("article")
        .cloned()
        .map(serde_json::from_value::<CachedArticle>);
    let mut article = match article {
        Some(Ok(article)) => article,
        Some(Err(err)) => {
            tracing::warn!(%url, error = %err, "cached article is malformed; not cached");
            return Lookup::Miss;
        }
        None => {
            tracing::warn!(%url, "lookup hit carried no article; not cached");
            return Lookup::Miss;
        }
    };

    if let Some(colors) = &article.colors {
        if colors.len() != article.paragraphs.len() {
            tracing::warn!(
                %url,
                colors = colors.len(),
                paragraphs = article.paragraphs.len(),
                "cached colours do not match paragraphs; discarding colours"
            );
            article.colors = None;
        }
    }

    tracing::debug!(%url, paragraphs = article.paragraphs.len(), "article cached");
    Lookup::Hit(article)
}
