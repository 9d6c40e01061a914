use image::imageops::FilterType;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::display::DisplayMode;
use crate::poster::PosterWidget;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  app.gfx.poster_area = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ❋ flick ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.mode == AppMode::Detail && app.detail.is_some() {
    render_detail(frame, app, area);
  } else if !app.search_results.is_empty() {
    render_results(frame, app, area);
  } else {
    render_welcome(frame, app.theme(), area);
  }
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("❋  Welcome to flick", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search movies. Browse posters. In the terminal.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a title below and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let [list_area, poster_area] =
    Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(area);

  render_result_list(frame, app, list_area);
  render_poster_pane(frame, app, poster_area);
}

fn render_result_list(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .search_results
    .iter()
    .enumerate()
    .map(|(i, movie)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      // Title on the left, year right-aligned with a 2-char gap.
      let year = movie.year.as_str();
      let line = if year.is_empty() {
        Line::from(Span::styled(truncate_str(&movie.title, inner_w), Style::default().fg(fg)))
      } else {
        let year_w = year.chars().count();
        let title = truncate_str(&movie.title, inner_w.saturating_sub(year_w + 2));
        let gap = inner_w.saturating_sub(title.chars().count() + year_w);
        Line::from(vec![
          Span::styled(title, Style::default().fg(fg)),
          Span::raw(" ".repeat(gap)),
          Span::styled(year.to_string(), Style::default().fg(theme.muted)),
        ])
      };

      ListItem::new(line).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(format!(" Results ({}) ", app.search_results.len()))
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// The shared poster pane: selected result's poster in Results mode, the
/// fetched record's poster in Detail mode. For Kitty/Sixel the pane only
/// records its geometry; transmission happens after the frame.
fn render_poster_pane(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let block = Block::bordered()
    .title(" Poster ")
    .title_style(Style::default().fg(theme.muted))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let Some(current) = app.poster_to_display().map(|(id, _)| id.to_string()) else {
    let hint = Paragraph::new(Line::from(Span::styled("No poster", Style::default().fg(theme.muted))))
      .alignment(Alignment::Center);
    let hint_area = Rect { y: inner.y + inner.height / 2, height: 1, ..inner };
    frame.render_widget(hint, hint_area);
    return;
  };

  if app.display_mode.is_cell_graphics() {
    app.gfx.poster_area = Some(inner);
    return;
  }

  let needs_resize = match &app.gfx.resized_poster {
    Some((id, w, h, _)) => *id != current || *w != inner.width || *h != inner.height,
    None => true,
  };
  if needs_resize {
    // Half-block packs two pixel rows per cell; ASCII is one per cell.
    let target_h = match app.display_mode {
      DisplayMode::Direct => inner.height as u32 * 2,
      _ => inner.height as u32,
    };
    let source = match app.mode {
      AppMode::Detail => app.detail_poster.as_ref().map(|(_, image)| image),
      AppMode::Input | AppMode::Results => app.poster_cache.get(&current),
    };
    if let Some(image) = source {
      let resized = image.resize_to_fill((inner.width as u32).max(1), target_h.max(1), FilterType::Lanczos3);
      app.gfx.resized_poster = Some((current.clone(), inner.width, inner.height, resized));
    }
  }

  if let Some((ref id, _, _, ref resized)) = app.gfx.resized_poster
    && *id == current
  {
    frame.render_widget(PosterWidget { image: resized, display_mode: app.display_mode }, inner);
  }
}

fn render_detail(frame: &mut Frame, app: &mut App, area: Rect) {
  let [poster_area, info_area] =
    Layout::horizontal([Constraint::Percentage(38), Constraint::Percentage(62)]).areas(area);

  render_poster_pane(frame, app, poster_area);

  let theme = app.theme();
  let Some(detail) = app.detail.as_ref() else { return };

  let info_block = Block::bordered()
    .title(Line::from(vec![
      Span::styled(" Details ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
      Span::styled("(b: back) ", Style::default().fg(theme.muted)),
    ]))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let label = |text: &'static str| Span::styled(text, Style::default().fg(theme.muted));
  let value = |text: &str| Span::styled(text.to_string(), Style::default().fg(theme.fg));

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(
      format!("{} ({})", detail.title, detail.year),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    Line::from(vec![label("Rating    "), Span::styled(detail.rating_label(), Style::default().fg(theme.accent))]),
    Line::from(vec![label("Runtime   "), value(&detail.runtime)]),
    Line::from(vec![label("Genre     "), value(&detail.genre)]),
    Line::from(vec![label("Director  "), value(&detail.director)]),
    Line::from(vec![label("Cast      "), value(&detail.actors)]),
    Line::from(""),
    Line::from(label("Plot")),
  ];
  for plot_line in detail.plot.lines() {
    lines.push(Line::from(value(plot_line)));
  }

  let paragraph =
    Paragraph::new(lines).block(info_block).wrap(Wrap { trim: false }).scroll((app.detail_scroll, 0));
  frame.render_widget(paragraph, info_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if app.is_loading() {
    let tick = (app.started_at.elapsed().as_millis() / 100) as usize % SPINNER.len();
    let msg = app.status_message.as_deref().unwrap_or("Loading…");
    (format!(" {} {}", SPINNER[tick], msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if !app.search_results.is_empty() {
    (format!(" {} results", app.search_results.len()), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search movies ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_results = !app.search_results.is_empty();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Search"), ("^t", "Theme")];
      if has_results {
        k.push(("↓", "Results"));
        k.push(("Esc", "Results"));
      } else {
        k.push(("Esc", "Quit"));
      }
      k
    }
    AppMode::Results => {
      vec![("Enter", "Details"), ("j/k", "Navigate"), ("/", "Search"), ("^t", "Theme"), ("Esc", "Search")]
    }
    AppMode::Detail => {
      vec![("b", "Back"), ("j/k", "Scroll"), ("^t", "Theme"), ("Esc", "Back")]
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
