//! Class source fetchers.

use super::SourceFetcher;
use crate::utils::config::{DEFAULT_SOURCE_TIMEOUT, SOURCE_EXTENSIONS};
use crate::utils::error::FetchError;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Reads `<Class>.cls` or `<Class>.trigger` from a local directory
#[derive(Debug, Clone)]
pub struct DirectorySourceFetcher {
    root: PathBuf,
}

impl DirectorySourceFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceFetcher for DirectorySourceFetcher {
    fn fetch(&self, class_name: &str) -> Result<Vec<String>, FetchError> {
        validate_class_name(class_name)?;

        for ext in SOURCE_EXTENSIONS {
            let path = self.root.join(format!("{}.{}", class_name, ext));
            if path.is_file() {
                debug!("Reading source for {} from {}", class_name, path.display());
                let text = fs::read_to_string(&path)?;
                return Ok(split_lines(&text));
            }
        }

        Err(FetchError::NotFound(class_name.to_string()))
    }
}

/// Fetches source with `GET {base_url}/{Class}`; the body is the plain text
pub struct HttpSourceFetcher {
    client: Client,
    base_url: String,
}

impl HttpSourceFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, DEFAULT_SOURCE_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::RequestFailed)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url_for(&self, class_name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), class_name)
    }
}

impl SourceFetcher for HttpSourceFetcher {
    fn fetch(&self, class_name: &str) -> Result<Vec<String>, FetchError> {
        validate_class_name(class_name)?;
        let url = self.url_for(class_name);

        info!("Fetching source for class: {}", class_name);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(FetchError::RequestFailed)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(class_name.to_string()));
        }

        let text = response
            .error_for_status()
            .map_err(FetchError::RequestFailed)?
            .text()
            .map_err(FetchError::RequestFailed)?;

        Ok(split_lines(&text))
    }
}

/// Class and trigger names are plain identifiers
fn validate_class_name(class_name: &str) -> Result<(), FetchError> {
    let valid = !class_name.is_empty()
        && class_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidClassName(class_name.to_string()))
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}
