use anyhow::Context as _;

/// Default filter for the admin CLI: only warnings reach stderr.
pub const CLI_DEFAULT_FILTER: &str = "warn";
/// Default filter for the server, including one line per HTTP request.
pub const SERVER_DEFAULT_FILTER: &str = "info,tower_http=debug";

fn build_filter(
    from_env: Option<String>,
    default_filter: &str,
) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    let directives = from_env
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default_filter.to_string());
    tracing_subscriber::EnvFilter::try_new(&directives)
        .with_context(|| format!("build log filter: {directives:?}"))
}

/// Log to stderr, filtered by `RUST_LOG` or `default_filter` when unset.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok(), default_filter)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_env_falls_back_to_default() -> anyhow::Result<()> {
        let filter = build_filter(Some("  ".to_string()), SERVER_DEFAULT_FILTER)?;
        assert!(filter.to_string().contains("tower_http=debug"));
        Ok(())
    }

    #[test]
    fn env_overrides_default() -> anyhow::Result<()> {
        let filter = build_filter(Some("debug".to_string()), CLI_DEFAULT_FILTER)?;
        assert_eq!(filter.to_string(), "debug");
        Ok(())
    }
}
