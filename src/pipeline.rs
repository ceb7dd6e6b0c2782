use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::model::FighterRecord;
use crate::parser::listing::{count_or_zero, parse_listing, ListingRow, RawRow};
use crate::parser::units::{parse_height_cm, parse_weight_kg};
use crate::portrait::PortraitLookup;

/// Source of one partition's fighters. Never fails: a bad partition is empty.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    async fn fetch_partition(&self, key: char) -> Vec<FighterRecord>;
}

/// Turn one listing row into a record, looking up its portrait.
///
/// `None` only when the row itself is unusable; bad counts fall back to 0
/// and unparseable measurements to `None`.
pub async fn extract_record(cells: RawRow, portraits: &dyn PortraitLookup) -> Option<FighterRecord> {
    let row = match ListingRow::from_cells(cells) {
        Ok(row) => row,
        Err(e) => {
            debug!("Skipping row: {}", e);
            return None;
        }
    };

    let image_url = portraits.fetch_portrait(&row.first_name, &row.last_name).await;

    Some(FighterRecord {
        height_cm: parse_height_cm(&row.height),
        weight_kg: parse_weight_kg(&row.weight),
        wins: count_or_zero(&row.wins),
        losses: count_or_zero(&row.losses),
        draws: count_or_zero(&row.draws),
        image_url,
        first_name: row.first_name,
        last_name: row.last_name,
    })
}

/// Extract every row concurrently, at most `pool_size` at a time.
///
/// All rows are dispatched up front; records come back in completion order.
pub async fn extract_rows(
    key: char,
    rows: Vec<RawRow>,
    portraits: Arc<dyn PortraitLookup>,
    pool_size: usize,
) -> Vec<FighterRecord> {
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1)));

    // Channel: workers send results, this task folds them into the partition
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Option<FighterRecord>>(pool_size.max(1) * 2);

    for cells in rows {
        let sem = Arc::clone(&semaphore);
        let portraits = Arc::clone(&portraits);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let record = extract_record(cells, portraits.as_ref()).await;
            let _ = tx.send(record).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut fighters = Vec::new();
    while let Some(result) = rx.recv().await {
        if let Some(fighter) = result {
            debug!(
                "[{}] {} {}",
                key.to_ascii_uppercase(),
                fighter.first_name,
                fighter.last_name
            );
            fighters.push(fighter);
        }
    }
    fighters
}

/// Parse a listing page and extract its fighters. A page without the
/// statistics table yields nothing.
pub async fn scrape_listing(
    key: char,
    html: &str,
    portraits: Arc<dyn PortraitLookup>,
    pool_size: usize,
) -> Vec<FighterRecord> {
    let rows = match parse_listing(html) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Listing for char={} unusable: {}", key, e);
            return Vec::new();
        }
    };
    extract_rows(key, rows, portraits, pool_size).await
}

/// Fetches listing pages from the stats site.
pub struct ListingClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ListingClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create listing HTTP client")?;
        Ok(Self {
            client,
            base_url: config.listing_url.clone(),
            timeout: config.listing_timeout,
        })
    }

    pub fn page_url(&self, key: char) -> String {
        format!("{}?char={}&page=all", self.base_url, key)
    }

    /// Single attempt; no retry.
    pub async fn fetch_page(&self, key: char) -> Result<String, FetchError> {
        let url = self.page_url(key);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Body { url, source })
    }
}

/// Listing pages plus portrait enrichment, one partition at a time.
pub struct Scraper {
    listing: ListingClient,
    portraits: Arc<dyn PortraitLookup>,
    pool_size: usize,
}

impl Scraper {
    pub fn new(listing: ListingClient, portraits: Arc<dyn PortraitLookup>, pool_size: usize) -> Self {
        Self {
            listing,
            portraits,
            pool_size,
        }
    }
}

#[async_trait]
impl PartitionSource for Scraper {
    async fn fetch_partition(&self, key: char) -> Vec<FighterRecord> {
        let html = match self.listing.fetch_page(key).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch char={}: {}", key, e);
                return Vec::new();
            }
        };

        let fighters = scrape_listing(key, &html, Arc::clone(&self.portraits), self.pool_size).await;
        info!("char={}: {} fighters", key, fighters.len());
        fighters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePortraits {
        images: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakePortraits {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                images: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PortraitLookup for FakePortraits {
        async fn fetch_portrait(&self, first: &str, last: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.images.get(&format!("{} {}", first, last)).cloned()
        }
    }

    /// Tracks how many lookups run at the same time.
    struct SlowPortraits {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PortraitLookup for SlowPortraits {
        async fn fetch_portrait(&self, _first: &str, _last: &str) -> Option<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn row(first: &str, last: &str, wins: &str) -> RawRow {
        [first, last, "", "6' 2\"", "185 lbs.", "76\"", "Southpaw", wins, "2", "1", ""]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn record_from_full_row() {
        let portraits = FakePortraits::new(&[("Jon Jones", "https://img/jj.jpg")]);
        let r = extract_record(row("Jon", "Jones", "27"), &portraits).await.unwrap();
        assert_eq!(r.first_name, "Jon");
        assert_eq!(r.last_name, "Jones");
        assert_eq!(r.height_cm, Some(188.0));
        assert_eq!(r.weight_kg, Some(83.9));
        assert_eq!((r.wins, r.losses, r.draws), (27, 2, 1));
        assert_eq!(r.image_url.as_deref(), Some("https://img/jj.jpg"));
    }

    #[tokio::test]
    async fn bad_count_defaults_to_zero() {
        let portraits = FakePortraits::new(&[]);
        let r = extract_record(row("Jon", "Jones", "--"), &portraits).await.unwrap();
        assert_eq!(r.wins, 0);
        assert_eq!(r.losses, 2);
        assert_eq!(r.image_url, None);
    }

    #[tokio::test]
    async fn short_row_is_skipped_without_lookup() {
        let portraits = FakePortraits::new(&[]);
        let cells = vec!["Jon".to_string(), "Jones".to_string()];
        assert!(extract_record(cells, &portraits).await.is_none());
        assert!(extract_record(Vec::new(), &portraits).await.is_none());
        assert_eq!(portraits.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_page_end_to_end() {
        let portraits: Arc<dyn PortraitLookup> =
            Arc::new(FakePortraits::new(&[("Tom Aaron", "https://img/ta.jpg")]));
        let mut fighters = scrape_listing('a', &fixture("listing_a"), portraits, 4).await;
        fighters.sort_by(|a, b| a.first_name.cmp(&b.first_name));

        assert_eq!(fighters.len(), 2);

        let danny = &fighters[0];
        assert_eq!((danny.first_name.as_str(), danny.last_name.as_str()), ("Danny", "Abbadi"));
        assert_eq!(danny.wins, 0);
        assert_eq!(danny.losses, 6);
        assert_eq!(danny.draws, 0);
        assert_eq!(danny.height_cm, Some(180.3));
        assert_eq!(danny.weight_kg, Some(70.3));
        assert_eq!(danny.image_url, None);

        let tom = &fighters[1];
        assert_eq!((tom.first_name.as_str(), tom.last_name.as_str()), ("Tom", "Aaron"));
        assert_eq!((tom.wins, tom.losses, tom.draws), (5, 3, 0));
        assert_eq!(tom.image_url.as_deref(), Some("https://img/ta.jpg"));
    }

    #[tokio::test]
    async fn empty_table_yields_empty_partition() {
        let portraits: Arc<dyn PortraitLookup> = Arc::new(FakePortraits::new(&[]));
        assert!(scrape_listing('q', &fixture("listing_empty"), portraits, 50).await.is_empty());
    }

    #[tokio::test]
    async fn page_without_table_yields_empty_partition() {
        let portraits: Arc<dyn PortraitLookup> = Arc::new(FakePortraits::new(&[]));
        let html = "<html><body><h1>Service unavailable</h1></body></html>";
        assert!(scrape_listing('x', html, portraits, 50).await.is_empty());
    }

    #[tokio::test]
    async fn pool_size_bounds_concurrency() {
        let slow = Arc::new(SlowPortraits {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let rows: Vec<RawRow> = (0..12).map(|i| row("F", &format!("L{}", i), "1")).collect();

        let portraits: Arc<dyn PortraitLookup> = slow.clone();
        let fighters = extract_rows('b', rows, portraits, 3).await;

        assert_eq!(fighters.len(), 12);
        let peak = slow.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency {}", peak);
    }

    #[tokio::test]
    async fn unreachable_listing_yields_empty_partition() {
        let config = Config {
            listing_url: "http://127.0.0.1:9/statistics/fighters".to_string(),
            listing_timeout: Duration::from_millis(500),
            ..Config::default()
        };
        let listing = ListingClient::new(&config).unwrap();
        assert_eq!(
            listing.page_url('a'),
            "http://127.0.0.1:9/statistics/fighters?char=a&page=all"
        );
        let portraits = Arc::new(FakePortraits::new(&[]));
        let scraper = Scraper::new(listing, portraits.clone(), 50);

        assert!(scraper.fetch_partition('a').await.is_empty());
        assert_eq!(portraits.calls.load(Ordering::SeqCst), 0);
    }

    fn scraper_at(server: &StubServer, portraits: Arc<FakePortraits>) -> Scraper {
        let config = Config {
            listing_url: format!("{}/statistics/fighters", server.base),
            ..Config::default()
        };
        Scraper::new(ListingClient::new(&config).unwrap(), portraits, 50)
    }

    #[tokio::test]
    async fn error_status_yields_empty_partition() {
        let server = StubServer::start(|_| (500, "upstream down".to_string())).await;
        let portraits = Arc::new(FakePortraits::new(&[("Tom Aaron", "https://img/ta.jpg")]));

        let fighters = scraper_at(&server, portraits.clone()).fetch_partition('a').await;

        assert!(fighters.is_empty());
        assert_eq!(portraits.calls.load(Ordering::SeqCst), 0);
        assert_eq!(server.paths(), vec!["/statistics/fighters?char=a&page=all"]);
    }

    #[tokio::test]
    async fn served_listing_page_is_scraped() {
        let page = fixture("listing_a");
        let server = StubServer::start(move |_| (200, page.clone())).await;
        let portraits = Arc::new(FakePortraits::new(&[("Tom Aaron", "https://img/ta.jpg")]));

        let fighters = scraper_at(&server, portraits.clone()).fetch_partition('a').await;

        assert_eq!(fighters.len(), 2);
        assert_eq!(portraits.calls.load(Ordering::SeqCst), 2);
        assert_eq!(server.paths(), vec!["/statistics/fighters?char=a&page=all"]);
    }
}
