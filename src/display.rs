use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Kitty,
  Sixel,
  Direct,
  Ascii,
}

/// How poster images reach the terminal, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Kitty,
  Sixel,
  Direct,
  Ascii,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Kitty => "Kitty",
      DisplayMode::Sixel => "Sixel",
      DisplayMode::Direct => "Half-block",
      DisplayMode::Ascii => "ASCII",
    }
  }

  /// Whether this mode draws into terminal cells via an escape-sequence
  /// protocol after the ratatui frame, rather than through the widget tree.
  pub fn is_cell_graphics(self) -> bool {
    matches!(self, DisplayMode::Kitty | DisplayMode::Sixel)
  }

  /// Detect the best mode the terminal supports.
  ///
  /// Kitty graphics when TERM or TERM_PROGRAM says so, Sixel for the handful
  /// of terminals that speak it, true-color half-blocks when COLORTERM
  /// advertises 24-bit, plain ASCII otherwise.
  pub fn detect() -> Self {
    let term = std::env::var("TERM").unwrap_or_default();
    let term_program = std::env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();

    if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
      return DisplayMode::Kitty;
    }
    if term.contains("sixel") || matches!(term_program.as_str(), "foot" | "mlterm" | "contour") {
      return DisplayMode::Sixel;
    }

    let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
    if matches!(colorterm.as_str(), "truecolor" | "24bit") {
      return DisplayMode::Direct;
    }
    DisplayMode::Ascii
  }
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => DisplayMode::detect(),
    CliDisplayMode::Kitty => DisplayMode::Kitty,
    CliDisplayMode::Sixel => DisplayMode::Sixel,
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}
