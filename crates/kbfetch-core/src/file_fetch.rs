//! File fetch worker - downloads a URL into a local file
//!
//! Independent of the download host: no dedup, no pending table. Only
//! `301 Moved Permanently` is followed; any other status, including other
//! redirects, ends the loop and its body is written as-is.

use crate::error::FetchError;
use crate::pool::WorkerPool;
use kbfetch_types::{FileFetchDone, Settings};
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Downloads one URL to one file
#[derive(Debug)]
pub struct FileFetchWorker {
    url: String,
    target: PathBuf,
    max_redirects: u32,
    connect_timeout: Duration,
    timeout: Option<Duration>,
    user_agent: String,
    pool: WorkerPool,
}

impl FileFetchWorker {
    /// Create a worker; the target path is fixed here.
    ///
    /// Without `file_name` a random lowercase name is generated; without
    /// `directory` the system temp directory is used.
    pub fn new(url: impl Into<String>, file_name: Option<&str>, directory: Option<&Path>) -> Self {
        let file_name = match file_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => random_file_name(),
        };
        let directory = match directory {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::temp_dir(),
        };
        let defaults = Settings::default();

        Self {
            url: url.into(),
            target: directory.join(file_name),
            max_redirects: defaults.max_redirects,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            timeout: None,
            user_agent: defaults.user_agent,
            pool: WorkerPool::file_fetch(),
        }
    }

    /// Apply redirect limit, timeouts and user agent from settings
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.max_redirects = settings.max_redirects;
        self.connect_timeout = Duration::from_secs(settings.connect_timeout_secs);
        self.timeout = settings.fetch_timeout_secs.map(Duration::from_secs);
        self.user_agent = settings.user_agent.clone();
        self
    }

    /// Run on `pool` instead of the shared file-fetch pool
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Queue the download on the pool without waiting for it
    pub fn start_download(self) -> JoinHandle<FileFetchDone> {
        let pool = self.pool.clone();
        pool.spawn(self.run())
    }

    /// Download in the current task and report the outcome
    pub async fn run(self) -> FileFetchDone {
        let success = match self.download().await {
            Ok(written) => {
                info!("Saved {} ({} bytes) from {}", self.target.display(), written, self.url);
                true
            }
            Err(e) => {
                warn!(kind = e.kind(), "Fetching {} failed: {}", self.url, e);
                false
            }
        };

        FileFetchDone {
            path: self.target,
            success,
        }
    }

    /// Follow 301s, then write the final body to the target file
    pub async fn download(&self) -> Result<u64, FetchError> {
        let client = self.build_client()?;
        let mut url = Url::parse(&self.url).map_err(|_| FetchError::InvalidUrl(self.url.clone()))?;
        let mut hops = 0u32;

        let response = loop {
            debug!("GET {}", url);
            let response = client.get(url.as_str()).send().await?;

            if response.status() != StatusCode::MOVED_PERMANENTLY {
                break response;
            }
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
            else {
                break response;
            };

            if hops >= self.max_redirects {
                return Err(FetchError::TooManyRedirects {
                    url: self.url.clone(),
                    limit: self.max_redirects,
                });
            }
            let next = url
                .join(&location)
                .map_err(|_| FetchError::InvalidUrl(location.clone()))?;
            hops += 1;
            debug!("Redirect {} -> {} (hop {})", url, next, hops);
            url = next;
        };

        let status = response.status();
        if !status.is_success() {
            warn!("{} answered {}; saving the body anyway", url, status);
        }
        let body = response.bytes().await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.target)
            .await
            .map_err(|source| FetchError::FileOpenFailed {
                path: self.target.clone(),
                source,
            })?;
        file.write_all(&body).await?;
        file.flush().await?;

        Ok(body.len() as u64)
    }

    fn build_client(&self) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Random file name made of lowercase ASCII letters only
pub fn random_file_name() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .map(|c| match c.to_digit(16) {
            Some(nibble) => char::from(b'a' + nibble as u8),
            None => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_are_lowercase_letters() {
        let name = random_file_name();
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
        assert_ne!(name, random_file_name());
    }

    #[test]
    fn target_defaults_to_temp_dir() {
        let worker = FileFetchWorker::new("http://example.com/a", None, None);
        assert_eq!(worker.target_path().parent(), Some(std::env::temp_dir().as_path()));
    }

    #[test]
    fn target_uses_given_name_and_directory() {
        let worker = FileFetchWorker::new("http://example.com/a", Some("logo.png"), Some(Path::new("/data/cache")));
        assert_eq!(worker.target_path(), Path::new("/data/cache/logo.png"));
    }
}
