use async_trait::async_trait;
use langcon_client::BackendError;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/0sami6/langcon/main/src-tauri/Cargo.toml";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    async fn latest_version(&self) -> Result<String, BackendError>;
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("invalid manifest url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct HttpReleaseFeed {
    client: reqwest::Client,
    manifest_url: Url,
}

impl HttpReleaseFeed {
    pub fn new(manifest_url: &str) -> Result<Self, ReleaseError> {
        let manifest_url = Url::parse(manifest_url)?;
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            manifest_url,
        })
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn latest_version(&self) -> Result<String, BackendError> {
        let resp = self
            .client
            .get(self.manifest_url.clone())
            .send()
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::unavailable(format!(
                "failed to fetch latest version ({status})"
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;

        parse_manifest_version(&body)
            .ok_or_else(|| BackendError::unavailable("no version line in release manifest"))
    }
}

/// First `version = "..."` line of a Cargo manifest. Not a TOML parser:
/// `version.workspace = true` and similar keys are skipped.
pub fn parse_manifest_version(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != "version" {
            return None;
        }
        let value = value.trim().trim_matches(|c: char| c == '"' || c.is_whitespace());
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Canned answers, consumed in order. The last one repeats.
pub struct StaticReleaseFeed {
    answers: Mutex<Vec<Result<String, BackendError>>>,
}

impl StaticReleaseFeed {
    pub fn new(version: impl Into<String>) -> Self {
        Self::sequence([Ok(version.into())])
    }

    pub fn unreachable() -> Self {
        Self::sequence([Err(BackendError::unavailable("release feed unreachable"))])
    }

    pub fn sequence(answers: impl IntoIterator<Item = Result<String, BackendError>>) -> Self {
        let mut answers: Vec<_> = answers.into_iter().collect();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Result<String, BackendError>>> {
        match self.answers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ReleaseFeed for StaticReleaseFeed {
    async fn latest_version(&self) -> Result<String, BackendError> {
        let mut answers = self.lock();
        match answers.len() {
            0 => Err(BackendError::unavailable("release feed empty")),
            1 => answers[0].clone(),
            _ => answers
                .pop()
                .unwrap_or_else(|| Err(BackendError::unavailable("release feed empty"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_version_takes_first_plain_version_key() {
        let body = r#"
[package]
name = "langcon"
version = "1.4.2"
edition = "2021"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
"#;
        assert_eq!(parse_manifest_version(body).as_deref(), Some("1.4.2"));

        let workspace = "[package]\nversion.workspace = true\n";
        assert_eq!(parse_manifest_version(workspace), None);
        assert_eq!(parse_manifest_version("version = \"\"\n"), None);
    }

    #[test]
    fn invalid_url_is_rejected_up_front() {
        assert!(matches!(
            HttpReleaseFeed::new("not a url"),
            Err(ReleaseError::InvalidUrl(_))
        ));
        let feed = HttpReleaseFeed::new(DEFAULT_MANIFEST_URL).unwrap();
        assert_eq!(feed.manifest_url().host_str(), Some("raw.githubusercontent.com"));
    }

    #[tokio::test]
    async fn static_feed_replays_then_repeats_last() {
        let feed = StaticReleaseFeed::sequence([
            Err(BackendError::unavailable("timeout")),
            Ok("2.0.0".to_string()),
        ]);
        assert!(feed.latest_version().await.is_err());
        assert_eq!(feed.latest_version().await.unwrap(), "2.0.0");
        assert_eq!(feed.latest_version().await.unwrap(), "2.0.0");
    }
}
