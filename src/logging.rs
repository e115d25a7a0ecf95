use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// CLI logging: `RUST_LOG` when set, otherwise `info`. Logs go to stderr so
/// stdout stays machine-readable.
pub fn init() -> anyhow::Result<()> {
    init_with_default("info")
}

/// Same as [`init`] with a caller-chosen fallback filter, e.g. to surface
/// request traces in the background server.
pub fn init_with_default(default_directives: &str) -> anyhow::Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_directives)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn build_filter(from_env: Option<&str>, default_directives: &str) -> anyhow::Result<EnvFilter> {
    match from_env.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => EnvFilter::try_new(raw).with_context(|| format!("parse RUST_LOG={raw:?}")),
        None => EnvFilter::try_new(default_directives).context("build log filter"),
    }
}
