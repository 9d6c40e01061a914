use ratatui::style::Color;

/// A named UI palette. Cycled with Ctrl+T and persisted across runs.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub status: Color,
  pub error: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: &[Theme] = &[
  Theme {
    name: "Marquee",
    bg: Color::Rgb(22, 19, 27),
    fg: Color::Rgb(228, 222, 236),
    accent: Color::Rgb(240, 179, 90),
    muted: Color::Rgb(130, 122, 145),
    border: Color::Rgb(66, 58, 82),
    status: Color::Rgb(150, 200, 170),
    error: Color::Rgb(235, 115, 115),
    highlight_fg: Color::Rgb(24, 20, 16),
    highlight_bg: Color::Rgb(240, 179, 90),
    stripe_bg: Color::Rgb(29, 25, 36),
    key_fg: Color::Rgb(24, 20, 16),
    key_bg: Color::Rgb(130, 122, 145),
  },
  Theme {
    name: "Noir",
    bg: Color::Rgb(16, 16, 16),
    fg: Color::Rgb(214, 214, 214),
    accent: Color::Rgb(245, 245, 245),
    muted: Color::Rgb(112, 112, 112),
    border: Color::Rgb(64, 64, 64),
    status: Color::Rgb(176, 176, 176),
    error: Color::Rgb(222, 100, 100),
    highlight_fg: Color::Rgb(16, 16, 16),
    highlight_bg: Color::Rgb(214, 214, 214),
    stripe_bg: Color::Rgb(24, 24, 24),
    key_fg: Color::Rgb(16, 16, 16),
    key_bg: Color::Rgb(112, 112, 112),
  },
  Theme {
    name: "Matinee",
    bg: Color::Rgb(246, 241, 231),
    fg: Color::Rgb(58, 50, 44),
    accent: Color::Rgb(176, 82, 54),
    muted: Color::Rgb(150, 138, 124),
    border: Color::Rgb(204, 192, 174),
    status: Color::Rgb(96, 134, 98),
    error: Color::Rgb(178, 58, 58),
    highlight_fg: Color::Rgb(246, 241, 231),
    highlight_bg: Color::Rgb(176, 82, 54),
    stripe_bg: Color::Rgb(238, 231, 218),
    key_fg: Color::Rgb(246, 241, 231),
    key_bg: Color::Rgb(150, 138, 124),
  },
];
