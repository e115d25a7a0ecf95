//! One loaded page: cache lookup, extraction or re-binding, then scroll
//! tracking. All per-page state lives in [`ReadingSession`].

use std::collections::HashSet;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CompiledHeuristics;
use crate::detect::{detect_container, resolve_locator};
use crate::dom::{Document, NodeId};
use crate::dominant::select_dominant;
use crate::formats::{ArticleSubmission, CachedArticle};
use crate::layout::Layout;
use crate::metadata::{article_author, article_date, article_title};
use crate::normalize::extract_paragraphs;
use crate::reidentify::{DEFAULT_COLOR, ParagraphBinding, bind_paragraphs};
use crate::sync::{Lookup, SyncClient};
use crate::visibility::{ScrollSpy, update_spies};

#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub container: NodeId,
    pub submission: ArticleSubmission,
}

/// Detector, metadata extractors and normalizer over a freshly loaded page.
pub fn extract_article(
    doc: &Document,
    url: &str,
    layout: &dyn Layout,
    heuristics: &CompiledHeuristics,
) -> ExtractedArticle {
    let detection = detect_container(doc, layout, heuristics);
    let date = article_date(doc, detection.node, heuristics);
    let author = article_author(doc, detection.node, heuristics);

    let mut flagged: HashSet<NodeId> = detection.flagged;
    flagged.extend(date.flagged);
    flagged.extend(author.flagged);
    let paragraphs = extract_paragraphs(doc, detection.node, &flagged, heuristics);

    ExtractedArticle {
        container: detection.node,
        submission: ArticleSubmission {
            element: detection.locator,
            url: url.to_string(),
            title: article_title(doc),
            author: author.value,
            date: date.value,
            paragraphs,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cached,
    Extracted,
}

/// Emitted when the reading position moves to another paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionReport {
    pub paragraph_index: usize,
    pub color: String,
}

pub struct ReadingSession {
    doc: Document,
    url: String,
    heuristics: CompiledHeuristics,
    client: SyncClient,
    origin: Origin,
    container: NodeId,
    paragraphs: Vec<String>,
    bindings: Vec<ParagraphBinding>,
    spies: Vec<ScrollSpy>,
    dominant: Option<usize>,
    pending: Vec<JoinHandle<()>>,
}

impl ReadingSession {
    /// Runs the page-load flow. Returns `None` when `cancel` fires before the
    /// cache lookup completes.
    pub async fn load(
        doc: Document,
        url: &str,
        layout: &dyn Layout,
        client: SyncClient,
        heuristics: CompiledHeuristics,
        cancel: &CancellationToken,
    ) -> Option<Self> {
        let lookup = client.lookup(url, cancel).await;
        let mut session = Self {
            doc,
            url: url.to_string(),
            heuristics,
            client,
            origin: Origin::Extracted,
            container: NodeId(0),
            paragraphs: Vec::new(),
            bindings: Vec::new(),
            spies: Vec::new(),
            dominant: None,
            pending: Vec::new(),
        };
        session.container = session.doc.body();

        match lookup {
            Lookup::Cancelled => return None,
            Lookup::Hit(article) => session.restore(article, layout),
            Lookup::Miss => session.extract(layout),
        }
        tracing::info!(
            url = %session.url,
            origin = ?session.origin,
            paragraphs = session.paragraphs.len(),
            bound = session.bindings.len(),
            "reading session ready"
        );
        Some(session)
    }

    fn restore(&mut self, article: CachedArticle, layout: &dyn Layout) {
        self.origin = Origin::Cached;
        self.container = match resolve_locator(&self.doc, &article.element) {
            Some(node) => node,
            None => {
                tracing::warn!(
                    url = %self.url,
                    locator = ?article.element,
                    "cached container not found; detecting it again"
                );
                detect_container(&self.doc, layout, &self.heuristics).node
            }
        };
        self.bindings = bind_paragraphs(
            &mut self.doc,
            self.container,
            &article.paragraphs,
            article.colors.as_deref(),
            &self.heuristics.paragraph_tag,
        );
        self.paragraphs = article.paragraphs;
    }

    fn extract(&mut self, layout: &dyn Layout) {
        let extracted = extract_article(&self.doc, &self.url, layout, &self.heuristics);
        self.origin = Origin::Extracted;
        self.container = extracted.container;
        self.bindings = bind_paragraphs(
            &mut self.doc,
            self.container,
            &extracted.submission.paragraphs,
            None,
            &self.heuristics.paragraph_tag,
        );
        self.paragraphs = extracted.submission.paragraphs.clone();
        let handle = self.client.submit(extracted.submission);
        self.pending.push(handle);
    }

    /// Scroll or touch-move: re-measures every paragraph and reports the
    /// reading position when it lands on a different paragraph.
    pub fn on_scroll(&mut self, layout: &dyn Layout) -> Option<PositionReport> {
        update_spies(&mut self.spies, &self.bindings, layout);
        let index = select_dominant(&self.spies, self.heuristics.visibility_threshold)?
            .paragraph_index;
        if self.dominant == Some(index) {
            return None;
        }
        self.dominant = Some(index);
        let report = PositionReport {
            paragraph_index: index,
            color: self.color_of(index).to_string(),
        };
        tracing::debug!(paragraph = index, color = %report.color, "reading position changed");
        self.track(self.client.report_color(&report.color));
        Some(report)
    }

    /// Colour picked on a paragraph's affordance. Returns `false` when no
    /// paragraph is bound at `index`.
    pub fn on_color_input(&mut self, index: usize, color: &str) -> bool {
        let Some(binding) = self.bindings.iter().find(|binding| binding.index == index) else {
            return false;
        };
        binding.affordance.set_color(&mut self.doc, color);

        let colors: Vec<String> = (0..self.paragraphs.len())
            .map(|index| self.color_of(index).to_string())
            .collect();
        self.track(self.client.save_colors(&self.url, colors));
        if self.dominant == Some(index) {
            self.track(self.client.report_color(color));
        }
        true
    }

    /// Waits for every background message sent so far.
    pub async fn settle(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background message task failed");
            }
        }
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.pending.retain(|pending| !pending.is_finished());
        self.pending.push(handle);
    }

    fn color_of(&self, index: usize) -> &str {
        self.bindings
            .iter()
            .find(|binding| binding.index == index)
            .map_or(DEFAULT_COLOR, |binding| binding.affordance.color(&self.doc))
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn bindings(&self) -> &[ParagraphBinding] {
        &self.bindings
    }

    pub fn spies(&self) -> &[ScrollSpy] {
        &self.spies
    }

    pub fn dominant(&self) -> Option<usize> {
        self.dominant
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::{LayoutSnapshot, StaticLayout};
    use crate::sync::background::Background;
    use crate::sync::store::{
        ArticleStore as _, InMemoryArticleStore, LocalFsArticleStore, article_key,
    };
    use crate::sync::transport::InProcessTransport;

    const PAGE: &str = r#"<html><head><title>Bridge vote delayed | Valley News</title></head><body>
<div id="story">
  <p class="byline"><a rel="author">Ann Lee</a></p>
  <p>The council met on Tuesday to discuss the new bridge.</p>
  <p>Residents raised concerns about traffic during construction.</p>
  <p>A final vote is expected next month.</p>
</div>
</body></html>"#;

    fn client(store: Arc<InMemoryArticleStore>) -> (SyncClient, Arc<Background>) {
        let background = Arc::new(Background::new(store));
        let transport = InProcessTransport::new(Arc::clone(&background));
        (SyncClient::new(Arc::new(transport)), background)
    }

    #[test]
    fn extraction_leaves_the_byline_out() {
        let doc = Document::parse_html(PAGE);
        let layout = StaticLayout::new(&doc, 800.0);
        let extracted = extract_article(
            &doc,
            "https://news.example/bridge",
            &layout,
            &CompiledHeuristics::default(),
        );

        assert_eq!(extracted.submission.title, "Bridge vote delayed");
        assert_eq!(extracted.submission.author, "Ann Lee");
        assert_eq!(extracted.submission.paragraphs.len(), 3);
        assert_eq!(
            extracted.submission.paragraphs[0],
            "The council met on Tuesday to discuss the new bridge."
        );
        assert_eq!(extracted.container, doc.element_by_id("story").unwrap());
    }

    #[tokio::test]
    async fn a_miss_extracts_submits_and_tracks_position() {
        let store = Arc::new(InMemoryArticleStore::new());
        let (client, background) = client(Arc::clone(&store));
        let doc = Document::parse_html(PAGE);
        let static_layout_doc = doc.clone();
        let layout = StaticLayout::new(&static_layout_doc, 800.0);

        let mut session = ReadingSession::load(
            doc,
            "https://news.example/bridge",
            &layout,
            client,
            CompiledHeuristics::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        session.settle().await;

        assert_eq!(session.origin(), Origin::Extracted);
        assert_eq!(session.bindings().len(), 3);
        let stored = store
            .get(&article_key("https://news.example/bridge"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.paragraphs, session.paragraphs());

        let nodes: Vec<NodeId> = session.bindings().iter().map(|b| b.node).collect();
        let snapshot = LayoutSnapshot::new(800.0)
            .with_box(nodes[0], 10.0, 400.0)
            .with_box(nodes[1], 410.0, 400.0)
            .with_box(nodes[2], 810.0, 400.0);

        let first = session.on_scroll(&snapshot).unwrap();
        assert_eq!(first.paragraph_index, 0);
        assert_eq!(first.color, DEFAULT_COLOR);
        assert!(session.on_scroll(&snapshot.scrolled_to(100.0)).is_none());

        assert!(session.on_color_input(1, "#00aa00"));
        let second = session.on_scroll(&snapshot.scrolled_to(300.0)).unwrap();
        assert_eq!(second.paragraph_index, 1);
        assert_eq!(second.color, "#00aa00");

        session.settle().await;
        assert_eq!(background.current_color().await.as_deref(), Some("#00aa00"));
        let stored = store
            .get(&article_key("https://news.example/bridge"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.colors,
            Some(vec![
                DEFAULT_COLOR.to_string(),
                "#00aa00".to_string(),
                DEFAULT_COLOR.to_string()
            ])
        );
    }

    #[tokio::test]
    async fn a_cancelled_lookup_yields_no_session() {
        let (client, _) = client(Arc::new(InMemoryArticleStore::new()));
        let doc = Document::parse_html(PAGE);
        let layout = LayoutSnapshot::new(800.0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let session = ReadingSession::load(
            doc,
            "u",
            &layout,
            client,
            CompiledHeuristics::default(),
            &cancel,
        )
        .await;
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn unknown_affordances_are_ignored() {
        let (client, _) = client(Arc::new(InMemoryArticleStore::new()));
        let doc = Document::parse_html(PAGE);
        let layout_doc = doc.clone();
        let layout = StaticLayout::new(&layout_doc, 800.0);
        let mut session = ReadingSession::load(
            doc,
            "u",
            &layout,
            client,
            CompiledHeuristics::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!session.on_color_input(99, "#fff"));
        session.settle().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn a_colour_picked_right_after_a_miss_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalFsArticleStore::new(dir.path()));
        let url = "https://news.example/bridge";

        for _ in 0..20 {
            let background = Arc::new(Background::new(store.clone()));
            let client = SyncClient::new(Arc::new(InProcessTransport::new(background)));
            let doc = Document::parse_html(PAGE);
            let layout_doc = doc.clone();
            let layout = StaticLayout::new(&layout_doc, 800.0);

            let mut session = ReadingSession::load(
                doc,
                url,
                &layout,
                client,
                CompiledHeuristics::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
            assert_eq!(session.origin(), Origin::Extracted);
            assert!(session.on_color_input(1, "#00aa00"));
            session.settle().await;

            let stored = store.get(&article_key(url)).await.unwrap().unwrap();
            assert_eq!(
                stored.colors.as_ref().map(|colors| colors[1].as_str()),
                Some("#00aa00")
            );
            std::fs::remove_dir_all(dir.path().join("articles")).unwrap();
        }
    }

    #[tokio::test]
    async fn the_latest_of_two_quick_picks_wins() {
        let store = Arc::new(InMemoryArticleStore::new());
        let (client, _) = client(Arc::clone(&store));
        let doc = Document::parse_html(PAGE);
        let layout_doc = doc.clone();
        let layout = StaticLayout::new(&layout_doc, 800.0);
        let mut session = ReadingSession::load(
            doc,
            "u",
            &layout,
            client,
            CompiledHeuristics::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(session.on_color_input(0, "#111111"));
        assert!(session.on_color_input(0, "#222222"));
        session.settle().await;

        let stored = store.get(&article_key("u")).await.unwrap().unwrap();
        assert_eq!(stored.colors.unwrap()[0], "#222222");
    }
}
