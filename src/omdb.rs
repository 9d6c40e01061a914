use anyhow::{Context, anyhow, bail};
use image::DynamicImage;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::constants;

/// User-facing message when a search request dies in transit.
pub const SEARCH_FAILED: &str = "Failed to fetch movies";

/// User-facing message when a detail request dies in transit.
pub const DETAIL_FAILED: &str = "Failed to fetch movie details";

/// The two ways an OMDb request can fail.
///
/// `Upstream` means the service answered and flagged the request itself
/// (no matches, invalid API key, invalid id); its message is shown to the
/// user verbatim. `Transport` covers everything between us and a well-formed
/// answer (connect/timeout, non-success status, a body that isn't OMDb JSON);
/// its message is diagnostic only and the UI substitutes a fixed string.
#[derive(Debug, Error)]
pub enum OmdbError {
  #[error("{0}")]
  Upstream(String),
  #[error("{0}")]
  Transport(String),
}

/// One hit from the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovieSummary {
  #[serde(rename = "Title")]
  pub title: String,
  #[serde(rename = "Year", default)]
  pub year: String,
  #[serde(rename = "imdbID")]
  pub imdb_id: String,
  #[serde(rename = "Poster", default)]
  pub poster: String,
}

/// The full record from the detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovieDetail {
  #[serde(rename = "Title")]
  pub title: String,
  #[serde(rename = "Year", default)]
  pub year: String,
  #[serde(rename = "imdbID", default)]
  pub imdb_id: String,
  #[serde(rename = "imdbRating", default)]
  pub rating: String,
  #[serde(rename = "Runtime", default)]
  pub runtime: String,
  #[serde(rename = "Genre", default)]
  pub genre: String,
  #[serde(rename = "Director", default)]
  pub director: String,
  #[serde(rename = "Actors", default)]
  pub actors: String,
  #[serde(rename = "Plot", default)]
  pub plot: String,
  #[serde(rename = "Poster", default)]
  pub poster: String,
}

impl MovieSummary {
  /// Poster URL with the "no image" sentinel already substituted.
  pub fn poster_url(&self) -> &str {
    resolve_poster_url(&self.poster)
  }
}

impl MovieDetail {
  pub fn poster_url(&self) -> &str {
    resolve_poster_url(&self.poster)
  }

  /// The rating line as rendered in the detail card.
  pub fn rating_label(&self) -> String {
    format!("⭐ {}", self.rating)
  }
}

/// Substitute OMDb's "no image" sentinel with the placeholder URL.
/// Anything else passes through untouched, including empty strings.
pub fn resolve_poster_url(poster: &str) -> &str {
  let c = constants();
  if poster == c.no_poster_sentinel { c.poster_placeholder_url.as_str() } else { poster }
}

// Every OMDb payload carries `Response: "True"|"False"` at the top level,
// with the failure message in `Error`. Decoded first, on its own, so a
// failure envelope never has to round-trip through the payload structs.
#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(rename = "Response")]
  response: String,
  #[serde(rename = "Error")]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
  #[serde(rename = "Search", default)]
  search: Vec<MovieSummary>,
}

impl Envelope {
  fn ok(&self) -> bool {
    self.response.eq_ignore_ascii_case("true")
  }

  fn into_message(self) -> String {
    self.error.unwrap_or_else(|| "OMDb reported an error".to_string())
  }
}

/// Decode a search response body into summaries, upstream order preserved.
pub(crate) fn decode_search_body(body: &str) -> Result<Vec<MovieSummary>, OmdbError> {
  let envelope: Envelope =
    serde_json::from_str(body).map_err(|e| OmdbError::Transport(format!("decode envelope: {e}")))?;
  if !envelope.ok() {
    return Err(OmdbError::Upstream(envelope.into_message()));
  }
  let page: SearchPage = serde_json::from_str(body).map_err(|e| OmdbError::Transport(format!("decode page: {e}")))?;
  Ok(page.search)
}

/// Decode a detail response body into a full record.
pub(crate) fn decode_detail_body(body: &str) -> Result<MovieDetail, OmdbError> {
  let envelope: Envelope =
    serde_json::from_str(body).map_err(|e| OmdbError::Transport(format!("decode envelope: {e}")))?;
  if !envelope.ok() {
    return Err(OmdbError::Upstream(envelope.into_message()));
  }
  serde_json::from_str(body).map_err(|e| OmdbError::Transport(format!("decode detail: {e}")))
}

// Request shapes must stay exactly `?s=...&apikey=...` and `?i=...&apikey=...`
// for compatibility with the service, so URLs are assembled by hand rather
// than through a query builder.

pub(crate) fn search_url(query: &str, api_key: &str) -> String {
  format!("{}?s={}&apikey={}", constants().omdb_base_url, urlencoding::encode(query), api_key)
}

pub(crate) fn detail_url(imdb_id: &str, api_key: &str) -> String {
  format!("{}?i={}&apikey={}", constants().omdb_base_url, imdb_id, api_key)
}

/// Build the shared HTTP client. The timeout is the only request deadline in
/// the system; individual calls await until it fires.
pub fn http_client() -> anyhow::Result<Client> {
  let c = constants();
  Client::builder()
    .user_agent(c.http_user_agent.as_str())
    .timeout(Duration::from_secs(c.request_timeout_secs))
    .build()
    .context("Failed to build HTTP client")
}

async fn get_body(client: &Client, url: &str) -> Result<String, OmdbError> {
  let resp = client.get(url).send().await.map_err(|e| OmdbError::Transport(format!("network: {e}")))?;
  let status = resp.status();
  if !status.is_success() {
    return Err(OmdbError::Transport(format!("HTTP {status}")));
  }
  resp.text().await.map_err(|e| OmdbError::Transport(format!("read body: {e}")))
}

/// `GET {base}?s={query}&apikey={key}`: title search.
pub async fn search_movies(client: &Client, api_key: &str, query: &str) -> Result<Vec<MovieSummary>, OmdbError> {
  debug!(query = %query, "omdb: search request");
  let body = get_body(client, &search_url(query, api_key)).await?;
  let hits = decode_search_body(&body)?;
  debug!(hits = hits.len(), "omdb: search response");
  Ok(hits)
}

/// `GET {base}?i={id}&apikey={key}`: full record for one title.
pub async fn fetch_movie_detail(client: &Client, api_key: &str, imdb_id: &str) -> Result<MovieDetail, OmdbError> {
  debug!(id = %imdb_id, "omdb: detail request");
  let body = get_body(client, &detail_url(imdb_id, api_key)).await?;
  decode_detail_body(&body)
}

/// Fetch and decode a poster image. Callers treat failure as "no poster";
/// the UI falls back to text.
pub async fn fetch_poster(client: &Client, url: &str) -> anyhow::Result<DynamicImage> {
  let resp = client.get(url).send().await.map_err(|e| anyhow!(e).context("Poster request failed"))?;
  if !resp.status().is_success() {
    bail!("Poster fetch failed: HTTP {}", resp.status());
  }
  let bytes = resp.bytes().await.with_context(|| format!("Failed to read poster bytes from {}", url))?;
  image::load_from_memory(&bytes).with_context(|| format!("Failed to decode poster image (URL: {})", url))
}

/// A prefetched poster, streamed back to the app as it lands.
#[derive(Debug)]
pub struct PosterImage {
  pub imdb_id: String,
  pub image: DynamicImage,
}

/// Fetch posters for a result page with bounded concurrency.
///
/// Each `(imdb_id, url)` entry is fetched and decoded independently; results
/// are sent through `tx` as they complete. Failures are logged and skipped so
/// one dead poster host never stalls the rest of the page.
pub async fn prefetch_posters(client: Client, entries: Vec<(String, String)>, tx: mpsc::Sender<PosterImage>) {
  use futures::stream::{self, StreamExt};

  stream::iter(entries)
    .map(|(imdb_id, url)| {
      let client = client.clone();
      let tx = tx.clone();
      async move {
        match fetch_poster(&client, &url).await {
          Ok(image) => {
            let _ = tx.send(PosterImage { imdb_id, image }).await;
          }
          Err(e) => {
            warn!(id = %imdb_id, err = %e, "poster prefetch failed");
          }
        }
      }
    })
    .buffer_unordered(constants().poster_prefetch_concurrency)
    .collect::<()>()
    .await;
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::constants;

  const BATMAN_SEARCH: &str = r#"{
    "Response": "True",
    "Search": [
      {"Title": "Batman", "Year": "1989", "imdbID": "tt0096895", "Poster": "N/A"}
    ],
    "totalResults": "1"
  }"#;

  // --- decode_search_body ---

  #[test]
  fn search_success_preserves_count_and_order() {
    let body = r#"{
      "Response": "True",
      "Search": [
        {"Title": "Alien", "Year": "1979", "imdbID": "tt0078748", "Poster": "https://x/1.jpg"},
        {"Title": "Aliens", "Year": "1986", "imdbID": "tt0090605", "Poster": "https://x/2.jpg"},
        {"Title": "Alien 3", "Year": "1992", "imdbID": "tt0103644", "Poster": "N/A"}
      ]
    }"#;
    let hits = decode_search_body(body).unwrap();
    assert_eq!(hits.len(), 3);
    let ids: Vec<&str> = hits.iter().map(|m| m.imdb_id.as_str()).collect();
    assert_eq!(ids, ["tt0078748", "tt0090605", "tt0103644"]);
  }

  #[test]
  fn search_upstream_failure_surfaces_message_verbatim() {
    let body = r#"{"Response": "False", "Error": "Movie not found!"}"#;
    match decode_search_body(body) {
      Err(OmdbError::Upstream(msg)) => assert_eq!(msg, "Movie not found!"),
      other => panic!("expected upstream error, got {:?}", other),
    }
  }

  #[test]
  fn search_upstream_failure_without_message_gets_fallback() {
    let body = r#"{"Response": "False"}"#;
    match decode_search_body(body) {
      Err(OmdbError::Upstream(msg)) => assert_eq!(msg, "OMDb reported an error"),
      other => panic!("expected upstream error, got {:?}", other),
    }
  }

  #[test]
  fn search_malformed_body_is_transport() {
    assert!(matches!(decode_search_body("<html>ratelimited</html>"), Err(OmdbError::Transport(_))));
    assert!(matches!(decode_search_body(""), Err(OmdbError::Transport(_))));
  }

  #[test]
  fn search_true_without_search_array_is_empty() {
    // Defensive: `Search` defaults to empty rather than failing the decode.
    let hits = decode_search_body(r#"{"Response": "True"}"#).unwrap();
    assert!(hits.is_empty());
  }

  #[test]
  fn batman_scenario_decodes_one_summary() {
    let hits = decode_search_body(BATMAN_SEARCH).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Batman");
    assert_eq!(hits[0].year, "1989");
    assert_eq!(hits[0].imdb_id, "tt0096895");
    assert_eq!(hits[0].poster_url(), constants().poster_placeholder_url);
  }

  // --- decode_detail_body ---

  #[test]
  fn detail_success_decodes_full_record() {
    let body = r#"{
      "Response": "True",
      "Title": "Batman",
      "Year": "1989",
      "imdbID": "tt0096895",
      "imdbRating": "7.5",
      "Runtime": "126 min",
      "Genre": "Action, Adventure",
      "Director": "Tim Burton",
      "Actors": "Michael Keaton, Jack Nicholson",
      "Plot": "The Dark Knight of Gotham City begins his war on crime.",
      "Poster": "N/A"
    }"#;
    let detail = decode_detail_body(body).unwrap();
    assert_eq!(detail.title, "Batman");
    assert_eq!(detail.rating, "7.5");
    assert_eq!(detail.rating_label(), "⭐ 7.5");
    assert_eq!(detail.director, "Tim Burton");
    assert_eq!(detail.poster_url(), constants().poster_placeholder_url);
  }

  #[test]
  fn detail_invalid_id_is_upstream() {
    let body = r#"{"Response": "False", "Error": "Incorrect IMDb ID."}"#;
    match decode_detail_body(body) {
      Err(OmdbError::Upstream(msg)) => assert_eq!(msg, "Incorrect IMDb ID."),
      other => panic!("expected upstream error, got {:?}", other),
    }
  }

  #[test]
  fn detail_malformed_body_is_transport() {
    assert!(matches!(decode_detail_body("not json"), Err(OmdbError::Transport(_))));
  }

  // --- resolve_poster_url ---

  #[test]
  fn sentinel_poster_becomes_placeholder() {
    assert_eq!(resolve_poster_url("N/A"), constants().poster_placeholder_url);
  }

  #[test]
  fn real_poster_passes_through() {
    assert_eq!(resolve_poster_url("https://x/p.jpg"), "https://x/p.jpg");
    assert_eq!(resolve_poster_url(""), "");
  }

  // --- request shapes ---

  #[test]
  fn search_url_encodes_query() {
    let url = search_url("the batman", "k3y");
    assert_eq!(url, "https://www.omdbapi.com/?s=the%20batman&apikey=k3y");
  }

  #[test]
  fn detail_url_shape() {
    let url = detail_url("tt0096895", "k3y");
    assert_eq!(url, "https://www.omdbapi.com/?i=tt0096895&apikey=k3y");
  }
}
