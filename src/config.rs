use std::path::PathBuf;
use std::time::Duration;

pub const LISTING_URL: &str = "http://ufcstats.com/statistics/fighters";
pub const PORTRAIT_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Runtime settings. Everything has a default; the CLI overrides a subset.
#[derive(Debug, Clone)]
pub struct Config {
    pub listing_url: String,
    pub portrait_url: String,
    /// Max rows processed at once within one partition
    pub pool_size: usize,
    /// Records gathered since the last checkpoint before the next one is written
    pub checkpoint_threshold: usize,
    pub listing_timeout: Duration,
    pub portrait_timeout: Duration,
    pub output: PathBuf,
    pub db_path: PathBuf,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listing_url: LISTING_URL.to_string(),
            portrait_url: PORTRAIT_URL.to_string(),
            pool_size: 50,
            checkpoint_threshold: 100,
            listing_timeout: Duration::from_secs(10),
            portrait_timeout: Duration::from_secs(5),
            output: PathBuf::from("fighters.json"),
            db_path: PathBuf::from("data/ufc.sqlite"),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn with_pool_size(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.pool_size = n.max(1);
        }
        self
    }

    pub fn with_checkpoint_threshold(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.checkpoint_threshold = n.max(1);
        }
        self
    }

    pub fn with_output(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.output = p;
        }
        self
    }

    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.db_path = p;
        }
        self
    }
}
