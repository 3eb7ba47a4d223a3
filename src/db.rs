//! Local vulnerability database and its updater

use crate::error::{Error, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Data files the scanner requires before a scan may run
pub const REQUIRED_FILES: &[&str] = &[
    "wordpresses.json",
    "plugins.json",
    "themes.json",
    "metadata.json",
];

/// Marker file recording the last successful refresh
const LAST_UPDATE_MARKER: &str = ".last_update";

/// Age beyond which present data counts as stale
const STALE_AFTER: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Default origin of the database files
const DATA_BASE_URL: &str = "https://data.wpscan.org";

/// Point-in-time queries over the local vulnerability database
///
/// Both answers reflect the moment of the call; the gate does not
/// assume they stay stable across the run.
pub trait VulnDatabase {
    /// Required data files are absent
    fn missing_files(&self) -> bool;

    /// Data is present but stale
    fn outdated(&self) -> bool;
}

/// Refreshes the local vulnerability database
pub trait Updater {
    /// Download the current data files
    async fn update(&self) -> Result<()>;
}

/// Database stored as plain files under a data directory
#[derive(Debug, Clone)]
pub struct FileDb {
    data_dir: PathBuf,
    stale_after: Duration,
}

impl FileDb {
    /// Open the database rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            stale_after: STALE_AFTER,
        }
    }

    /// Override the staleness threshold
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Directory holding the data files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Instant of the last successful refresh, if any
    fn last_update(&self) -> Option<SystemTime> {
        std::fs::metadata(self.data_dir.join(LAST_UPDATE_MARKER))
            .and_then(|meta| meta.modified())
            .ok()
    }
}

impl VulnDatabase for FileDb {
    fn missing_files(&self) -> bool {
        REQUIRED_FILES
            .iter()
            .any(|name| !self.data_dir.join(name).is_file())
    }

    fn outdated(&self) -> bool {
        match self.last_update() {
            Some(instant) => instant
                .elapsed()
                .map_or(true, |age| age > self.stale_after),
            None => true,
        }
    }
}

/// Updater downloading the data files over HTTP
#[derive(Debug, Clone)]
pub struct HttpUpdater {
    client: Client,
    base_url: String,
    data_dir: PathBuf,
}

impl HttpUpdater {
    /// Create an updater writing into `data_dir`
    pub fn new(client: Client, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_url: DATA_BASE_URL.to_string(),
            data_dir: data_dir.into(),
        }
    }

    /// Override the download origin
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Download one data file, replacing it atomically
    async fn download_file(&self, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), name);
        debug!(%url, "downloading database file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        let path = self.data_dir.join(name);
        let partial = self.data_dir.join(format!("{name}.part"));
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        Ok(())
    }
}

impl Updater for HttpUpdater {
    async fn update(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        for name in REQUIRED_FILES {
            info!(file = name, "updating database file");
            self.download_file(name).await?;
        }

        // Touching the marker records the refresh instant via its mtime
        tokio::fs::write(self.data_dir.join(LAST_UPDATE_MARKER), b"").await?;
        info!("database update complete");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn populate(dir: &Path) {
        for name in REQUIRED_FILES {
            std::fs::write(dir.join(name), b"{}").unwrap();
        }
    }

    #[test]
    fn missing_files_until_all_are_present() {
        let dir = tempfile::tempdir().unwrap();
        let db = FileDb::new(dir.path());
        assert!(db.missing_files());

        populate(dir.path());
        assert!(!db.missing_files());

        std::fs::remove_file(dir.path().join("plugins.json")).unwrap();
        assert!(db.missing_files());
    }

    #[test]
    fn outdated_without_marker_and_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let db = FileDb::new(dir.path());
        assert!(db.outdated());

        std::fs::write(dir.path().join(".last_update"), b"").unwrap();
        assert!(!db.outdated());

        let impatient = FileDb::new(dir.path()).with_stale_after(Duration::ZERO);
        assert!(impatient.outdated());
    }

    #[tokio::test]
    async fn update_downloads_all_files_and_touches_marker() {
        let server = MockServer::start().await;
        for name in REQUIRED_FILES {
            Mock::given(method("GET"))
                .and(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":1}"))
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let updater = HttpUpdater::new(Client::new(), dir.path()).with_base_url(server.uri());
        updater.update().await.unwrap();

        let db = FileDb::new(dir.path());
        assert!(!db.missing_files());
        assert!(!db.outdated());
    }

    #[tokio::test]
    async fn update_fails_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let updater = HttpUpdater::new(Client::new(), dir.path()).with_base_url(server.uri());
        let err = updater.update().await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus(404)));
    }
}
