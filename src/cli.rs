use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect the article in a saved page and print its record as JSON.
    Extract(ExtractArgs),
    /// Load a page against the store and replay scroll positions.
    Read(ReadArgs),
    /// Ask the store whether an article is cached.
    Lookup(LookupArgs),
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Saved HTML page.
    #[arg(long)]
    pub html: String,

    /// Address the page was loaded from (the store key).
    #[arg(long)]
    pub url: String,

    /// Layout snapshot JSON (boxes per node). Without it every visible node
    /// counts as rendered.
    #[arg(long)]
    pub layout: Option<String>,

    /// Viewport height used when no layout snapshot is given.
    #[arg(long, default_value_t = 800.0)]
    pub viewport_height: f64,

    /// Heuristics YAML overriding the built-in thresholds.
    #[arg(long)]
    pub heuristics: Option<String>,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Local article store directory (default: $STORYLIGHT_DATA_DIR).
    #[arg(long, conflicts_with = "background_url")]
    pub data_dir: Option<String>,

    /// Background endpoint base URL (default: $STORYLIGHT_BACKGROUND_URL).
    #[arg(long)]
    pub background_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Write the record here instead of stdout.
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub page: PageArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Scroll offsets to replay, in order.
    #[arg(long = "scroll", num_args = 1..)]
    pub scroll: Vec<f64>,

    /// Colour picks to apply before scrolling, as `INDEX=COLOR`.
    #[arg(long = "color")]
    pub colors: Vec<String>,

    /// Write the marked-up page here after the session ends.
    #[arg(long)]
    pub out_html: Option<String>,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    #[arg(long)]
    pub url: String,

    #[command(flatten)]
    pub store: StoreArgs,
}
