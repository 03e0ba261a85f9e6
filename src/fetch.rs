use anyhow::{bail, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::info;

use crate::raw::RawRecord;

pub const DEFAULT_BASE_URL: &str = "https://www.ranepa.ru/sync/getSovokupnost3.php";

/// Upstream category tag partitioning the paginated catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Bakalavriat,
    Specialitet,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Bakalavriat => "bakalavriat",
            Level::Specialitet => "specialitet",
        }
    }
}

/// HTTP client for the program catalog feed.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> CatalogClient {
        CatalogClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_page(&self, level: Level, page: usize) -> Result<Value> {
        let page_param = page.to_string();
        let res = self
            .http
            .get(&self.base_url)
            .query(&[("level", level.as_str()), ("page", page_param.as_str())])
            .send()
            .await
            .with_context(|| {
                format!("catalog request failed: level={}, page={}", level.as_str(), page)
            })?;

        if !res.status().is_success() {
            bail!(
                "catalog returned {}: level={}, page={}",
                res.status(),
                level.as_str(),
                page
            );
        }

        res.json::<Value>().await.with_context(|| {
            format!("catalog page is not valid JSON: level={}, page={}", level.as_str(), page)
        })
    }

    /// All pages of one level, concatenated in page order. Page 1 carries
    /// the total; the rest are fetched sequentially. Any failing page
    /// aborts the level with no partial result.
    pub async fn fetch_level_all_pages(&self, level: Level) -> Result<Vec<RawRecord>> {
        self.fetch_level_paged(level, progress_bar()?).await
    }

    async fn fetch_level_paged(&self, level: Level, pb: ProgressBar) -> Result<Vec<RawRecord>> {
        let first = self.fetch_page(level, 1).await?;
        let total = count_pages(&first);
        info!(level = level.as_str(), pages = total, "fetching catalog level");

        pb.set_length(total as u64);
        pb.set_message(level.as_str());

        let mut records = page_records(&first);
        pb.inc(1);

        for page in 2..=total {
            let body = self.fetch_page(level, page).await?;
            records.extend(page_records(&body));
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(level = level.as_str(), records = records.len(), "catalog level fetched");
        Ok(records)
    }

    /// The whole catalog: both levels, fetched concurrently (they are
    /// unrelated), concatenated bachelor-first.
    pub async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
        let multi = MultiProgress::new();
        let (mut bachelor, specialist) = tokio::try_join!(
            self.fetch_level_paged(Level::Bakalavriat, multi.add(progress_bar()?)),
            self.fetch_level_paged(Level::Specialitet, multi.add(progress_bar()?)),
        )?;
        bachelor.extend(specialist);
        Ok(bachelor)
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// `countPages` arrives as a number or a numeric string; anything absent,
/// non-numeric or non-positive collapses to a single page.
pub fn count_pages(body: &Value) -> usize {
    let n = match body.get("countPages") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n >= 1.0 {
        n as usize
    } else {
        1
    }
}

/// The page's record list; a missing or non-array `PROGRAMS` reads as empty.
pub fn page_records(body: &Value) -> Vec<RawRecord> {
    body.get("PROGRAMS")
        .and_then(Value::as_array)
        .map(|items| items.iter().cloned().map(RawRecord).collect())
        .unwrap_or_default()
}
