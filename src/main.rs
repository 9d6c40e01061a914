mod app;
mod config;
mod constants;
mod display;
mod input;
mod logging;
mod omdb;
mod poster;
mod theme;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;

use app::App;
use display::{CliDisplayMode, DisplayMode};
use poster::{kitty_clear_images, kitty_show_image, sixel_show_image};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Search movies from the terminal", long_about = None)]
struct Args {
  /// Poster display mode: 'auto', 'kitty', 'sixel', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// OMDb API key (overrides OMDB_API_KEY and the config file)
  #[arg(long)]
  api_key: Option<String>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = logging::init()?;

  // Resolved before raw mode so a missing key is a plain error message.
  let api_key = config::resolve_api_key(args.api_key.as_deref())?;
  let client = omdb::http_client()?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args.display_mode, api_key, client).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, cli_mode: CliDisplayMode, api_key: String, client: reqwest::Client) -> Result<()> {
  let display_mode = display::resolve_display_mode(cli_mode);
  info!(mode = display_mode.label(), "starting UI");
  let mut app = App::new(display_mode, api_key, client);

  loop {
    app.check_pending();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if display_mode.is_cell_graphics() {
      flush_poster_graphics(&mut app, display_mode)?;
    }

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  if display_mode == DisplayMode::Kitty {
    kitty_clear_images()?;
  }
  Ok(())
}

/// Send the poster for the current pane over the terminal graphics protocol,
/// re-transmitting only when the image or its placement changed.
fn flush_poster_graphics(app: &mut App, display_mode: DisplayMode) -> Result<()> {
  let current = app.gfx.poster_area.and_then(|area| {
    app.poster_to_display().map(|(id, _)| (id.to_string(), area))
  });

  let Some(key) = current else {
    // Pane went away (or has no image yet): clear any lingering placement.
    if app.gfx.last_sent.take().is_some() && display_mode == DisplayMode::Kitty {
      kitty_clear_images()?;
    }
    return Ok(());
  };

  if app.gfx.last_sent.as_ref() == Some(&key) {
    return Ok(());
  }

  if let Some((_, image)) = app.poster_to_display() {
    match display_mode {
      DisplayMode::Kitty => {
        kitty_clear_images()?;
        kitty_show_image(image, key.1)?;
      }
      DisplayMode::Sixel => sixel_show_image(image, key.1)?,
      _ => {}
    }
  }
  app.gfx.last_sent = Some(key);
  Ok(())
}
