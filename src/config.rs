use clap::Parser;
use url::Url;

/// Live football score widgets
#[derive(Parser, Debug, Clone)]
#[command(name = "scores-widget", version, about)]
pub struct Config {
    /// Widget API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "scores.db")]
    pub database_path: String,

    /// Live scores API base URL
    #[arg(
        long,
        env = "LIVE_SCORES_API_URL",
        default_value = "https://www.thesportsdb.com/api/v1/json"
    )]
    pub live_scores_api_url: String,

    /// Live scores API key
    #[arg(long, env = "LIVE_SCORES_API_KEY")]
    pub live_scores_api_key: Option<String>,

    /// Live scores polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "60")]
    pub poll_interval_secs: u64,

    /// Interval between unconditional widget refreshes in seconds
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "900")]
    pub refresh_interval_secs: u64,

    /// Maximum number of pending refresh requests
    #[arg(long, env = "REFRESH_QUEUE", default_value = "8")]
    pub refresh_queue: usize,

    /// Base URL crest images are served from. Defaults to the crests this
    /// server publishes under /static/crests/ next to the main view
    #[arg(long, env = "CREST_BASE_URL")]
    pub crest_base_url: Option<String>,

    /// Directory served at /static/crests/
    #[arg(long, env = "CREST_DIR", default_value = "static/crests")]
    pub crest_dir: String,

    /// Extra or replacement crest, as "Team Name=file.png" (repeatable)
    #[arg(long = "crest", value_name = "TEAM=FILE")]
    pub crests: Vec<String>,

    /// Page opened when a user taps the score on a widget
    #[arg(long, env = "MAIN_VIEW_URL", default_value = "http://localhost:8080/")]
    pub main_view_url: String,

    /// host:port used to decide whether the network is up
    #[arg(long, env = "CONNECTIVITY_PROBE_ADDR", default_value = "www.thesportsdb.com:443")]
    pub connectivity_probe_addr: String,

    /// Connectivity probe timeout in milliseconds
    #[arg(long, env = "CONNECTIVITY_TIMEOUT_MS", default_value = "1500")]
    pub connectivity_timeout_ms: u64,
}

impl Config {
    /// Where widgets load crests from. Without an explicit base this is the
    /// /static/crests/ path on the same origin as the main view.
    pub fn crest_base(&self) -> anyhow::Result<String> {
        if let Some(base) = &self.crest_base_url {
            return Ok(base.clone());
        }
        let mut url = Url::parse(&self.main_view_url)?;
        url.set_path("/static/crests/");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.to_string())
    }

    /// Crests served from `crest_dir` can be checked for on disk; an external
    /// base can't.
    pub fn serves_own_crests(&self) -> bool {
        self.crest_base_url.is_none()
    }

    /// Parsed `--crest` entries.
    pub fn crest_overrides(&self) -> anyhow::Result<Vec<(String, String)>> {
        self.crests
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((team, file)) if !team.trim().is_empty() && !file.trim().is_empty() => {
                    Ok((team.trim().to_string(), file.trim().to_string()))
                }
                _ => Err(anyhow::anyhow!("--crest expects TEAM=FILE, got '{}'", entry)),
            })
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be at least 1");
        }
        if self.refresh_queue == 0 {
            anyhow::bail!("refresh_queue must be at least 1");
        }
        if self.connectivity_timeout_ms == 0 {
            anyhow::bail!("connectivity_timeout_ms must be positive");
        }
        for (name, value) in [
            ("live_scores_api_url", Some(&self.live_scores_api_url)),
            ("crest_base_url", self.crest_base_url.as_ref()),
            ("main_view_url", Some(&self.main_view_url)),
        ] {
            let Some(value) = value else { continue };
            if let Err(e) = Url::parse(value) {
                anyhow::bail!("{} is not a valid URL ({}): {}", name, value, e);
            }
        }
        self.crest_overrides()?;
        if !self.connectivity_probe_addr.contains(':') {
            anyhow::bail!("connectivity_probe_addr must be host:port");
        }
        Ok(())
    }
}
