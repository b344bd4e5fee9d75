use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::FeedConfig;
use crate::error::{Result, VizError};
use crate::ledger::Batch;

/// Anything that can hand the visualizer an ordered batch list.
pub trait BatchSource {
    fn fetch_batches(&self) -> Result<Vec<Batch>>;
}

/// Fetch batches from the ledger REST API (blocking).
pub struct HttpBatchSource {
    url: Url,
    timeout: Duration,
}

impl HttpBatchSource {
    pub fn new(url_str: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url_str)
            .map_err(|e| VizError::Feed(format!("Invalid URL: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(VizError::Feed(format!("Unsupported scheme: {}", url.scheme())));
        }
        Ok(Self { url, timeout })
    }
}

impl BatchSource for HttpBatchSource {
    fn fetch_batches(&self) -> Result<Vec<Batch>> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("h2-flow-viz/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(|e| VizError::Feed(format!("Client error: {}", e)))?;

        let response = client
            .get(self.url.as_str())
            .header("Accept", "application/json")
            .send()
            .map_err(|e| VizError::Feed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VizError::Feed(format!("{} returned {}", self.url, status)));
        }

        let batches: Vec<Batch> = response
            .json()
            .map_err(|e| VizError::Feed(format!("Failed to decode body: {}", e)))?;
        log::info!("fetched {} batches from {}", batches.len(), self.url);
        Ok(batches)
    }
}

/// Read batches from a JSON array on disk.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BatchSource for JsonFileSource {
    fn fetch_batches(&self) -> Result<Vec<Batch>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| VizError::Feed(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| VizError::Feed(format!("{}: {}", self.path.display(), e)))
    }
}

/// A fixed, in-memory batch list.
pub struct StaticSource(pub Vec<Batch>);

impl BatchSource for StaticSource {
    fn fetch_batches(&self) -> Result<Vec<Batch>> {
        Ok(self.0.clone())
    }
}

/// Pick a source for the configured location: URLs go over HTTP, anything
/// else is treated as a file path.
pub fn source_for(config: &FeedConfig) -> Result<Box<dyn BatchSource + Send>> {
    let source = config.source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        let http = HttpBatchSource::new(source, Duration::from_secs(config.timeout_secs))?;
        Ok(Box::new(http))
    } else if source.is_empty() {
        Err(VizError::Feed("no feed source configured".into()))
    } else {
        Ok(Box::new(JsonFileSource::new(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BatchStatus;

    #[test]
    fn rejects_non_http_scheme() {
        let err = HttpBatchSource::new("ftp://ledger/batches", Duration::from_secs(1));
        assert!(matches!(err, Err(VizError::Feed(_))));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("h2flow-feed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("batches.json");
        let batches = vec![
            Batch::new("b1", BatchStatus::Issued),
            Batch::new("b2", BatchStatus::Retired),
        ];
        std::fs::write(&path, serde_json::to_string(&batches).unwrap()).unwrap();

        let loaded = JsonFileSource::new(&path).fetch_batches().unwrap();
        assert_eq!(loaded, batches);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_feed_error() {
        let err = JsonFileSource::new("/nonexistent/h2flow.json").fetch_batches();
        assert!(matches!(err, Err(VizError::Feed(_))));
    }

    #[test]
    fn source_for_dispatches_on_scheme() {
        let mut config = FeedConfig::default();
        assert!(source_for(&config).is_ok());
        config.source = "   ".into();
        assert!(source_for(&config).is_err());
        config.source = "demo/batches.json".into();
        assert!(source_for(&config).is_ok());
    }
}
