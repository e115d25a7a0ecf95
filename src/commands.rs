use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::{ExtractArgs, LookupArgs, PageArgs, ReadArgs, StoreArgs};
use crate::config::{CompiledHeuristics, Heuristics};
use crate::dom::Document;
use crate::formats::{ArticleRecord, CachedArticle};
use crate::layout::{Layout, LayoutSnapshot, StaticLayout};
use crate::metadata::parse_publication_date;
use crate::session::{ReadingSession, extract_article};
use crate::sync::background::Background;
use crate::sync::store::{LocalFsArticleStore, article_key};
use crate::sync::transport::{BACKGROUND_URL_ENV, HttpTransport, InProcessTransport, Transport};
use crate::sync::{Lookup, SyncClient};

pub const DATA_DIR_ENV: &str = "STORYLIGHT_DATA_DIR";

struct Page {
    doc: Document,
    snapshot: Option<LayoutSnapshot>,
    viewport_height: f64,
    heuristics: CompiledHeuristics,
}

impl Page {
    fn load(args: &PageArgs) -> anyhow::Result<Self> {
        let html = std::fs::read_to_string(&args.html)
            .with_context(|| format!("read html: {}", args.html))?;
        let snapshot = args
            .layout
            .as_deref()
            .map(|path| LayoutSnapshot::load(Path::new(path)))
            .transpose()?;
        if args.viewport_height.is_nan() || args.viewport_height <= 0.0 {
            anyhow::bail!("viewport height must be positive: {}", args.viewport_height);
        }
        let heuristics = Heuristics::load_or_default(args.heuristics.as_deref().map(Path::new))?
            .compile()
            .context("compile heuristics")?;
        Ok(Self {
            doc: Document::parse_html(&html),
            snapshot,
            viewport_height: args.viewport_height,
            heuristics,
        })
    }
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    let page = Page::load(&args.page)?;
    let static_layout = StaticLayout::new(&page.doc, page.viewport_height);
    let layout: &dyn Layout = match &page.snapshot {
        Some(snapshot) => snapshot,
        None => &static_layout,
    };

    let extracted = extract_article(&page.doc, &args.page.url, layout, &page.heuristics);
    let submission = extracted.submission;
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
    tracing::info!(
        url = %record.url,
        title = %record.title,
        paragraphs = record.paragraphs.len(),
        "extracted article"
    );

    let json = serde_json::to_string_pretty(&record).context("serialize article record")?;
    match args.out {
        Some(out) => {
            std::fs::write(&out, format!("{json}\n"))
                .with_context(|| format!("write article record: {out}"))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn read(args: ReadArgs) -> anyhow::Result<()> {
    if !args.scroll.is_empty() && args.page.layout.is_none() {
        anyhow::bail!("--scroll needs a --layout snapshot");
    }
    let colors = args
        .colors
        .iter()
        .map(|raw| parse_color_pick(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let page = Page::load(&args.page)?;
    let client = SyncClient::new(transport(&args.store)?);

    let layout_doc = page.doc.clone();
    let static_layout = StaticLayout::new(&layout_doc, page.viewport_height);
    let initial: &dyn Layout = match &page.snapshot {
        Some(snapshot) => snapshot,
        None => &static_layout,
    };

    let cancel = CancellationToken::new();
    let Some(mut session) = ReadingSession::load(
        page.doc,
        &args.page.url,
        initial,
        client,
        page.heuristics,
        &cancel,
    )
    .await
    else {
        anyhow::bail!("article lookup was cancelled");
    };

    for (index, color) in colors {
        if !session.on_color_input(index, &color) {
            tracing::warn!(paragraph = index, "no paragraph bound at this index; colour ignored");
        }
    }

    let mut reports = Vec::new();
    match &page.snapshot {
        Some(snapshot) if !args.scroll.is_empty() => {
            for offset in &args.scroll {
                reports.extend(session.on_scroll(&snapshot.scrolled_to(*offset)));
            }
        }
        _ => reports.extend(session.on_scroll(initial)),
    }
    for report in &reports {
        println!(
            "{}",
            serde_json::to_string(report).context("serialize position report")?
        );
    }

    session.settle().await;

    if let Some(out) = &args.out_html {
        let html = session.doc().outer_html(session.doc().root());
        std::fs::write(out, html).with_context(|| format!("write marked-up page: {out}"))?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LookupOutcome {
    Hit { key: String, article: CachedArticle },
    Miss { key: String },
}

pub async fn lookup(args: LookupArgs) -> anyhow::Result<()> {
    let client = SyncClient::new(transport(&args.store)?);
    let key = article_key(&args.url);
    let outcome = match client.lookup(&args.url, &CancellationToken::new()).await {
        Lookup::Hit(article) => LookupOutcome::Hit { key, article },
        Lookup::Miss => LookupOutcome::Miss { key },
        Lookup::Cancelled => anyhow::bail!("article lookup was cancelled"),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("serialize lookup outcome")?
    );
    Ok(())
}

/// Flags win over the environment; a background URL wins over a data dir.
fn transport(args: &StoreArgs) -> anyhow::Result<Arc<dyn Transport>> {
    if let Some(url) = &args.background_url {
        return Ok(Arc::new(HttpTransport::new(url)?));
    }
    if let Some(dir) = &args.data_dir {
        return Ok(local_transport(dir));
    }
    if env_value(BACKGROUND_URL_ENV).is_some() {
        return Ok(Arc::new(HttpTransport::from_env()?));
    }
    if let Some(dir) = env_value(DATA_DIR_ENV) {
        return Ok(local_transport(&dir));
    }
    anyhow::bail!(
        "no article store configured: pass --data-dir or --background-url, or set {DATA_DIR_ENV} or {BACKGROUND_URL_ENV}"
    );
}

fn local_transport(dir: &str) -> Arc<dyn Transport> {
    tracing::debug!(data_dir = %dir, "using local article store");
    let store = Arc::new(LocalFsArticleStore::new(dir));
    Arc::new(InProcessTransport::new(Arc::new(Background::new(store))))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_color_pick(raw: &str) -> anyhow::Result<(usize, String)> {
    let (index, color) = raw
        .split_once('=')
        .with_context(|| format!("colour pick must look like INDEX=COLOR: {raw:?}"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid paragraph index in colour pick: {raw:?}"))?;
    let color = color.trim();
    if color.is_empty() {
        anyhow::bail!("colour pick has no colour: {raw:?}");
    }
    Ok((index, color.to_string()))
}
