use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::state::session::PuzzleItem;

/// Why a single fetch did not yield an item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request could not be sent or its body not read.
    #[error("failed to reach item source `{url}`")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The item source answered with a non-success status.
    #[error("unexpected item source response status {status} for `{url}`")]
    Status { url: String, status: StatusCode },
    /// The puzzle description could not be parsed.
    #[error("malformed puzzle payload: {0}")]
    Parse(String),
    /// The fetch did not complete within the configured limit.
    #[error("item fetch timed out")]
    Timeout,
}

/// Remote source of puzzles. Performs exactly one attempt per call.
pub trait ItemSource: Send + Sync {
    /// Fetch one puzzle and its solution.
    fn fetch_one(&self) -> BoxFuture<'static, Result<PuzzleItem, FetchError>>;
}

/// Item source backed by the heart puzzle HTTP API in CSV mode.
///
/// The API answers `<image-url>,<solution>`; the image is downloaded with a
/// second request.
#[derive(Clone)]
pub struct HttpItemSource {
    client: Client,
    api_url: Arc<str>,
}

impl HttpItemSource {
    /// Build a source pointed at `api_url`.
    pub fn new(api_url: impl Into<Arc<str>>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
        }
    }

    async fn fetch(client: Client, api_url: Arc<str>) -> Result<PuzzleItem, FetchError> {
        let body = get_bytes(&client, &api_url).await?;
        let text = String::from_utf8(body)
            .map_err(|_| FetchError::Parse("puzzle description is not UTF-8".into()))?;
        let (image_url, solution) = parse_puzzle_line(&text)?;

        let image = get_bytes(&client, image_url).await?;
        if image.is_empty() {
            return Err(FetchError::Parse("puzzle image is empty".into()));
        }

        Ok(PuzzleItem::new(image, solution))
    }
}

impl ItemSource for HttpItemSource {
    fn fetch_one(&self) -> BoxFuture<'static, Result<PuzzleItem, FetchError>> {
        let client = self.client.clone();
        let api_url = self.api_url.clone();
        Box::pin(Self::fetch(client, api_url))
    }
}

async fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_owned(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_owned(),
            status,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_owned(),
            source,
        })?;
    Ok(bytes.to_vec())
}

/// Split a `<image-url>,<solution>` line.
fn parse_puzzle_line(line: &str) -> Result<(&str, i32), FetchError> {
    let line = line.trim();
    let (image_url, solution) = line
        .split_once(',')
        .ok_or_else(|| FetchError::Parse(format!("expected `<url>,<solution>`, got `{line}`")))?;

    let image_url = image_url.trim();
    if image_url.is_empty() {
        return Err(FetchError::Parse("missing image url".into()));
    }

    let solution = solution
        .trim()
        .parse::<i32>()
        .map_err(|err| FetchError::Parse(format!("invalid solution `{}`: {err}", solution.trim())))?;

    Ok((image_url, solution))
}

/// Source serving a fixed puzzle on every call, or never answering when empty.
#[cfg(test)]
pub(crate) struct FixedSource(pub Option<PuzzleItem>);

#[cfg(test)]
impl ItemSource for FixedSource {
    fn fetch_one(&self) -> BoxFuture<'static, Result<PuzzleItem, FetchError>> {
        match self.0.clone() {
            Some(item) => Box::pin(futures::future::ready(Ok(item))),
            None => Box::pin(futures::future::pending()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_and_solution() {
        let (url, solution) =
            parse_puzzle_line("https://example.test/heart/abc.png,7\n").unwrap();
        assert_eq!(url, "https://example.test/heart/abc.png");
        assert_eq!(solution, 7);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(
            parse_puzzle_line("https://example.test/heart.png"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_solution() {
        assert!(matches!(
            parse_puzzle_line("https://example.test/heart.png, seven"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_url() {
        assert!(matches!(parse_puzzle_line(" ,3"), Err(FetchError::Parse(_))));
    }
}
