//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // OMDb
  pub omdb_base_url: String,
  pub no_poster_sentinel: String,
  pub poster_placeholder_url: String,
  pub request_timeout_secs: u64,
  pub http_user_agent: String,

  // Poster pipeline
  pub poster_prefetch_concurrency: usize,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.no_poster_sentinel, "N/A");
    assert!(c.omdb_base_url.starts_with("https://"));
    assert!(c.request_timeout_secs > 0);
    assert!(c.poster_prefetch_concurrency > 0);
  }
}
