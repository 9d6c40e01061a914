use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::display::DisplayMode;
use crate::omdb::{self, MovieDetail, MovieSummary, OmdbError, PosterImage};
use crate::theme::THEMES;

// --- Types ---

pub type SearchOutcome = Result<Vec<MovieSummary>, OmdbError>;
pub type DetailOutcome = Result<(String, MovieDetail, Option<DynamicImage>), OmdbError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
  Detail,
}

/// Terminal graphics protocol rendering state (Kitty/Sixel).
#[derive(Default)]
pub struct GraphicsCache {
  /// Where the poster pane landed in the last frame, if any.
  pub poster_area: Option<Rect>,
  /// (imdb id, area) of the last poster transmitted over a graphics protocol.
  pub last_sent: Option<(String, Rect)>,
  /// (imdb id, pane w, pane h, image) cache for the half-block/ASCII widget.
  pub resized_poster: Option<(String, u16, u16, DynamicImage)>,
}

/// In-flight async task receivers and handles.
///
/// A request is in flight exactly while its receiver is present; every
/// resolution path (value, upstream error, task death) consumes it, which is
/// what makes the loading flag unconditional.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) search_rx: Option<oneshot::Receiver<SearchOutcome>>,
  pub(crate) detail_rx: Option<oneshot::Receiver<DetailOutcome>>,
  pub(crate) poster_rx: Option<mpsc::Receiver<PosterImage>>,
  pub(crate) poster_handle: Option<JoinHandle<()>>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub search_results: Vec<MovieSummary>,
  pub list_state: ListState,
  /// Present iff `mode == Detail`.
  pub detail: Option<MovieDetail>,
  pub detail_poster: Option<(String, DynamicImage)>,
  /// Vertical scroll offset for the plot paragraph in the detail view.
  pub detail_scroll: u16,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  /// Decoded posters by IMDb id, filled by prefetch and detail fetches.
  pub poster_cache: HashMap<String, DynamicImage>,
  pub gfx: GraphicsCache,
  pub client: Client,
  api_key: String,
  pub(crate) tasks: AsyncTasks,
  /// App start instant, used to drive the status-line spinner.
  pub started_at: Instant,
}

impl App {
  pub fn new(display_mode: DisplayMode, api_key: String, client: Client) -> Self {
    let config = Config::load();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };

    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Input,
      theme_index,
      display_mode,
      search_results: Vec::new(),
      list_state: ListState::default(),
      detail: None,
      detail_poster: None,
      detail_scroll: 0,
      last_error: None,
      status_message: None,
      should_quit: false,
      poster_cache: HashMap::new(),
      gfx: GraphicsCache::default(),
      client,
      api_key,
      tasks: AsyncTasks::default(),
      started_at: Instant::now(),
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and clamped to THEMES.len() - 1 on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&self) {
    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.save();
  }

  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
  }

  /// True exactly while a search or detail request is in flight.
  pub fn is_loading(&self) -> bool {
    self.tasks.search_rx.is_some() || self.tasks.detail_rx.is_some()
  }

  pub fn selected_summary(&self) -> Option<&MovieSummary> {
    self.search_results.get(self.list_state.selected()?)
  }

  /// The poster that belongs in the poster pane right now, keyed by IMDb id
  /// so the graphics pass can skip re-sends of the same placement.
  pub fn poster_to_display(&self) -> Option<(&str, &DynamicImage)> {
    match self.mode {
      AppMode::Detail => self.detail_poster.as_ref().map(|(id, image)| (id.as_str(), image)),
      AppMode::Input | AppMode::Results => {
        let entry = self.selected_summary()?;
        self.poster_cache.get(&entry.imdb_id).map(|image| (entry.imdb_id.as_str(), image))
      }
    }
  }

  // --- Triggers ---

  /// Submit the current input as a title search.
  ///
  /// An empty (or whitespace) query issues no request and changes nothing.
  /// Otherwise any in-flight search or detail request is superseded: its
  /// receiver is dropped here, so a late response lands in a closed channel
  /// and can never overwrite newer state.
  pub fn trigger_search(&mut self) {
    let query = self.input.trim().to_string();
    if query.is_empty() {
      return;
    }
    info!(query = %query, "search triggered");
    self.tasks.search_rx = None;
    self.tasks.detail_rx = None;
    self.cancel_poster_prefetch();
    self.clear_error();
    self.detail = None;
    self.detail_poster = None;
    self.detail_scroll = 0;
    self.status_message = Some(format!("Searching '{}'…", query));

    let client = self.client.clone();
    let api_key = self.api_key.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(omdb::search_movies(&client, &api_key, &query).await);
    });
    self.tasks.search_rx = Some(rx);
  }

  /// Fetch the full record for the selected result, plus its poster if the
  /// prefetch hasn't already delivered it.
  pub fn trigger_detail(&mut self) {
    let Some(entry) = self.selected_summary() else { return };
    let imdb_id = entry.imdb_id.clone();
    let poster_url = entry.poster_url().to_string();
    info!(id = %imdb_id, "detail fetch triggered");

    self.tasks.detail_rx = None;
    self.clear_error();
    self.status_message = Some("Loading details…".to_string());

    let client = self.client.clone();
    let api_key = self.api_key.clone();
    let cached = self.poster_cache.get(&imdb_id).cloned();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      match omdb::fetch_movie_detail(&client, &api_key, &imdb_id).await {
        Ok(detail) => {
          let poster = match cached {
            Some(image) => Some(image),
            // The detail record can carry a poster the search summary lacked.
            None => omdb::fetch_poster(&client, preferred_poster_url(&detail, &poster_url)).await.ok(),
          };
          let _ = tx.send(Ok((imdb_id, detail, poster)));
        }
        Err(e) => {
          let _ = tx.send(Err(e));
        }
      }
    });
    self.tasks.detail_rx = Some(rx);
  }

  /// Leave the detail view and return to the result list that was already
  /// loaded. Nothing is re-fetched.
  pub fn back_to_results(&mut self) {
    self.detail = None;
    self.detail_poster = None;
    self.detail_scroll = 0;
    self.mode = if self.search_results.is_empty() { AppMode::Input } else { AppMode::Results };
  }

  // --- Pending-task polling ---

  /// Poll every in-flight task once. Called each event-loop tick.
  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.tasks.search_rx.take() {
      match rx.try_recv() {
        Ok(outcome) => self.apply_search_outcome(outcome),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.search_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.apply_search_outcome(Err(OmdbError::Transport("search task died".to_string())));
        }
      }
    }

    if let Some(mut rx) = self.tasks.detail_rx.take() {
      match rx.try_recv() {
        Ok(outcome) => self.apply_detail_outcome(outcome),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.detail_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.apply_detail_outcome(Err(OmdbError::Transport("detail task died".to_string())));
        }
      }
    }

    // Drain prefetched posters into the cache.
    if let Some(ref mut rx) = self.tasks.poster_rx {
      while let Ok(poster) = rx.try_recv() {
        self.poster_cache.insert(poster.imdb_id, poster.image);
      }
    }
  }

  /// Search resolution. On success the result list is replaced wholesale in
  /// upstream order; on failure it empties and the error line explains why
  /// (upstream messages verbatim, transport failures as the fixed string).
  pub(crate) fn apply_search_outcome(&mut self, outcome: SearchOutcome) {
    self.status_message = None;
    match outcome {
      Ok(results) => {
        info!(hits = results.len(), "search succeeded");
        self.search_results = results;
        self.list_state.select(if self.search_results.is_empty() { None } else { Some(0) });
        self.mode = AppMode::Results;
        self.trigger_poster_prefetch();
      }
      Err(OmdbError::Upstream(msg)) => {
        self.search_results.clear();
        self.list_state.select(None);
        self.set_error(msg);
      }
      Err(OmdbError::Transport(detail)) => {
        warn!(err = %detail, "search transport failure");
        self.search_results.clear();
        self.list_state.select(None);
        self.set_error(omdb::SEARCH_FAILED.to_string());
      }
    }
  }

  /// Detail resolution. Success swaps the view to the detail card; any
  /// failure leaves the current view untouched apart from the error line.
  pub(crate) fn apply_detail_outcome(&mut self, outcome: DetailOutcome) {
    self.status_message = None;
    match outcome {
      Ok((imdb_id, detail, poster)) => {
        info!(id = %imdb_id, title = %detail.title, "detail fetch succeeded");
        if let Some(ref image) = poster {
          self.poster_cache.insert(imdb_id.clone(), image.clone());
        }
        self.detail_poster = poster.map(|image| (imdb_id, image));
        self.detail = Some(detail);
        self.detail_scroll = 0;
        self.mode = AppMode::Detail;
      }
      Err(OmdbError::Upstream(msg)) => {
        self.set_error(msg);
      }
      Err(OmdbError::Transport(detail)) => {
        warn!(err = %detail, "detail transport failure");
        self.set_error(omdb::DETAIL_FAILED.to_string());
      }
    }
  }

  // --- Poster prefetch ---

  fn cancel_poster_prefetch(&mut self) {
    if let Some(handle) = self.tasks.poster_handle.take() {
      handle.abort();
    }
    self.tasks.poster_rx = None;
  }

  /// Spawn background poster fetches for every result not already cached.
  /// A previous prefetch (for a superseded result page) is aborted first.
  fn trigger_poster_prefetch(&mut self) {
    self.cancel_poster_prefetch();

    let entries: Vec<(String, String)> = self
      .search_results
      .iter()
      .filter(|m| !self.poster_cache.contains_key(&m.imdb_id))
      .map(|m| (m.imdb_id.clone(), m.poster_url().to_string()))
      .collect();
    if entries.is_empty() {
      return;
    }

    let client = self.client.clone();
    let (tx, rx) = mpsc::channel(32);
    let handle = tokio::spawn(async move {
      omdb::prefetch_posters(client, entries, tx).await;
    });
    self.tasks.poster_rx = Some(rx);
    self.tasks.poster_handle = Some(handle);
  }
}

/// Prefer the poster URL from the detail record; the summary's resolved URL
/// is the fallback when the record carries nothing at all.
fn preferred_poster_url<'a>(detail: &'a MovieDetail, summary_url: &'a str) -> &'a str {
  let url = detail.poster_url();
  if url.is_empty() { summary_url } else { url }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::constants;

  fn summaries(ids: &[&str]) -> Vec<MovieSummary> {
    ids
      .iter()
      .map(|id| MovieSummary {
        title: format!("Movie {}", id),
        year: "1989".to_string(),
        imdb_id: id.to_string(),
        poster: "N/A".to_string(),
      })
      .collect()
  }

  fn detail(id: &str) -> MovieDetail {
    MovieDetail {
      title: "Batman".to_string(),
      year: "1989".to_string(),
      imdb_id: id.to_string(),
      rating: "7.5".to_string(),
      runtime: "126 min".to_string(),
      genre: "Action".to_string(),
      director: "Tim Burton".to_string(),
      actors: "Michael Keaton".to_string(),
      plot: "The Dark Knight of Gotham City begins his war on crime.".to_string(),
      poster: "N/A".to_string(),
    }
  }

  fn test_app() -> App {
    App::new(DisplayMode::Ascii, "test-key".to_string(), Client::new())
  }

  fn tiny_image() -> DynamicImage {
    DynamicImage::new_rgb8(1, 1)
  }

  // --- search ---

  #[tokio::test]
  async fn empty_query_is_a_noop() {
    let mut app = test_app();
    app.set_error("stale".to_string());

    for input in ["", "   ", "\t"] {
      app.input = input.to_string();
      app.trigger_search();
      assert!(app.tasks.search_rx.is_none(), "no request for {:?}", input);
      assert!(!app.is_loading());
      assert_eq!(app.mode, AppMode::Input);
      assert_eq!(app.last_error.as_deref(), Some("stale"), "state unchanged for {:?}", input);
    }
  }

  #[tokio::test]
  async fn search_sets_loading_and_clears_error_and_detail() {
    let mut app = test_app();
    app.input = "batman".to_string();
    app.set_error("old error".to_string());
    app.detail = Some(detail("tt0096895"));
    app.detail_poster = Some(("tt0096895".to_string(), tiny_image()));

    app.trigger_search();

    assert!(app.is_loading());
    assert!(app.last_error.is_none());
    assert!(app.detail.is_none());
    assert!(app.detail_poster.is_none());
  }

  #[tokio::test]
  async fn search_success_replaces_results_in_order() {
    let mut app = test_app();
    let (tx, rx) = oneshot::channel();
    app.tasks.search_rx = Some(rx);
    assert!(app.is_loading());

    tx.send(Ok(summaries(&["tt1", "tt2", "tt3"]))).unwrap();
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.mode, AppMode::Results);
    assert_eq!(app.list_state.selected(), Some(0));
    let ids: Vec<&str> = app.search_results.iter().map(|m| m.imdb_id.as_str()).collect();
    assert_eq!(ids, ["tt1", "tt2", "tt3"]);
  }

  #[tokio::test]
  async fn search_upstream_error_is_verbatim_and_empties_results() {
    let mut app = test_app();
    app.search_results = summaries(&["tt1"]);
    let (tx, rx) = oneshot::channel();
    app.tasks.search_rx = Some(rx);

    tx.send(Err(OmdbError::Upstream("Movie not found!".to_string()))).unwrap();
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.last_error.as_deref(), Some("Movie not found!"));
    assert!(app.search_results.is_empty());
  }

  #[tokio::test]
  async fn search_transport_error_uses_fixed_string() {
    let mut app = test_app();
    app.search_results = summaries(&["tt1"]);
    let (tx, rx) = oneshot::channel();
    app.tasks.search_rx = Some(rx);

    tx.send(Err(OmdbError::Transport("connect timeout".to_string()))).unwrap();
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.last_error.as_deref(), Some(omdb::SEARCH_FAILED));
    assert!(app.search_results.is_empty());
  }

  #[tokio::test]
  async fn search_task_death_clears_loading_via_closed_channel() {
    let mut app = test_app();
    let (tx, rx) = oneshot::channel::<SearchOutcome>();
    app.tasks.search_rx = Some(rx);
    assert!(app.is_loading());

    // A panicked task drops its sender without sending.
    drop(tx);
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.last_error.as_deref(), Some(omdb::SEARCH_FAILED));
  }

  #[tokio::test]
  async fn superseded_search_response_is_dropped() {
    let mut app = test_app();
    let (tx_old, rx_old) = oneshot::channel();
    app.tasks.search_rx = Some(rx_old);

    // A second search replaces the receiver, as trigger_search does.
    let (_tx_new, rx_new) = oneshot::channel();
    app.tasks.search_rx = Some(rx_new);

    // The stale task's send fails outright; its results can never land.
    assert!(tx_old.send(Ok(summaries(&["tt-stale"]))).is_err());
    app.check_pending();
    assert!(app.search_results.is_empty());
  }

  // --- detail ---

  #[tokio::test]
  async fn detail_success_enters_detail_view() {
    let mut app = test_app();
    app.search_results = summaries(&["tt0096895"]);
    app.list_state.select(Some(0));
    app.mode = AppMode::Results;

    let (tx, rx) = oneshot::channel();
    app.tasks.detail_rx = Some(rx);
    tx.send(Ok(("tt0096895".to_string(), detail("tt0096895"), Some(tiny_image())))).unwrap();
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.mode, AppMode::Detail);
    let d = app.detail.as_ref().unwrap();
    assert_eq!(d.title, "Batman");
    assert_eq!(d.rating_label(), "⭐ 7.5");
    assert!(app.poster_cache.contains_key("tt0096895"));
  }

  #[tokio::test]
  async fn detail_transport_error_leaves_view_untouched() {
    let mut app = test_app();
    app.search_results = summaries(&["tt1", "tt2"]);
    app.list_state.select(Some(1));
    app.mode = AppMode::Results;

    let (tx, rx) = oneshot::channel();
    app.tasks.detail_rx = Some(rx);
    tx.send(Err(OmdbError::Transport("dns".to_string()))).unwrap();
    app.check_pending();

    assert!(!app.is_loading());
    assert_eq!(app.mode, AppMode::Results);
    assert_eq!(app.search_results.len(), 2);
    assert_eq!(app.list_state.selected(), Some(1));
    assert!(app.detail.is_none());
    assert_eq!(app.last_error.as_deref(), Some(omdb::DETAIL_FAILED));
  }

  #[tokio::test]
  async fn detail_upstream_error_passes_message_through() {
    let mut app = test_app();
    app.mode = AppMode::Results;
    let (tx, rx) = oneshot::channel();
    app.tasks.detail_rx = Some(rx);

    tx.send(Err(OmdbError::Upstream("Incorrect IMDb ID.".to_string()))).unwrap();
    app.check_pending();

    assert_eq!(app.mode, AppMode::Results);
    assert_eq!(app.last_error.as_deref(), Some("Incorrect IMDb ID."));
  }

  #[tokio::test]
  async fn back_returns_to_same_results_without_refetch() {
    let mut app = test_app();
    app.search_results = summaries(&["tt1", "tt2"]);
    app.list_state.select(Some(1));
    app.mode = AppMode::Detail;
    app.detail = Some(detail("tt2"));
    app.detail_poster = Some(("tt2".to_string(), tiny_image()));
    let before = app.search_results.clone();

    app.back_to_results();

    assert_eq!(app.mode, AppMode::Results);
    assert!(app.detail.is_none());
    assert!(app.detail_poster.is_none());
    assert_eq!(app.search_results, before);
    assert_eq!(app.list_state.selected(), Some(1));
    assert!(!app.is_loading(), "back must not issue a request");
  }

  #[tokio::test]
  async fn back_with_no_results_lands_in_input_mode() {
    let mut app = test_app();
    app.mode = AppMode::Detail;
    app.detail = Some(detail("tt1"));

    app.back_to_results();

    assert_eq!(app.mode, AppMode::Input);
  }

  // --- posters ---

  #[tokio::test]
  async fn prefetched_posters_drain_into_cache() {
    let mut app = test_app();
    let (tx, rx) = mpsc::channel(4);
    app.tasks.poster_rx = Some(rx);

    tx.try_send(PosterImage { imdb_id: "tt1".to_string(), image: tiny_image() }).unwrap();
    tx.try_send(PosterImage { imdb_id: "tt2".to_string(), image: tiny_image() }).unwrap();
    app.check_pending();

    assert!(app.poster_cache.contains_key("tt1"));
    assert!(app.poster_cache.contains_key("tt2"));
  }

  #[tokio::test]
  async fn poster_pane_follows_selection_then_detail() {
    let mut app = test_app();
    app.search_results = summaries(&["tt1", "tt2"]);
    app.list_state.select(Some(1));
    app.mode = AppMode::Results;
    app.poster_cache.insert("tt2".to_string(), tiny_image());

    let (id, _) = app.poster_to_display().unwrap();
    assert_eq!(id, "tt2");

    app.mode = AppMode::Detail;
    app.detail = Some(detail("tt1"));
    app.detail_poster = Some(("tt1".to_string(), tiny_image()));
    let (id, _) = app.poster_to_display().unwrap();
    assert_eq!(id, "tt1");
  }

  // --- scenario: batman search wired through the decoder ---

  #[tokio::test]
  async fn batman_scenario_renders_one_card_with_placeholder_poster() {
    let body = r#"{
      "Response": "True",
      "Search": [{"Title": "Batman", "Year": "1989", "imdbID": "tt0096895", "Poster": "N/A"}]
    }"#;
    let mut app = test_app();
    let (tx, rx) = oneshot::channel();
    app.tasks.search_rx = Some(rx);
    tx.send(omdb::decode_search_body(body)).unwrap();
    app.check_pending();

    assert_eq!(app.search_results.len(), 1);
    assert_eq!(app.search_results[0].title, "Batman");
    assert_eq!(app.search_results[0].poster_url(), constants().poster_placeholder_url);
  }
}
