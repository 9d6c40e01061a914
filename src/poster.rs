use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_quant::NeuQuant;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::Color,
  widgets::Widget,
};
use std::io::{Cursor, Write};

use crate::display::DisplayMode;

// --- Poster widget ---

/// Renders a poster into the frame buffer for the modes that draw with
/// characters. Kitty and Sixel posters are transmitted after the frame
/// instead, so this widget leaves their cells alone.
pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => half_block_render(self.image, area, buf),
      DisplayMode::Ascii => ascii_render(self.image, area, buf),
      DisplayMode::Kitty | DisplayMode::Sixel => {}
    }
  }
}

fn centered(outer: u16, inner: u32) -> u16 {
  ((outer as u32).saturating_sub(inner) / 2) as u16
}

/// Two image rows per terminal cell: "▀" with fg = upper pixel, bg = lower.
/// The caller resizes to the pane, so this only clips and centers.
fn half_block_render(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let cols = rgb.width().min(area.width as u32);
  let rows = rgb.height().div_ceil(2).min(area.height as u32);
  let x0 = area.x + centered(area.width, cols);
  let y0 = area.y + centered(area.height, rows);

  for row in 0..rows {
    for col in 0..cols {
      let top = rgb.get_pixel(col, row * 2);
      let fg = Color::Rgb(top[0], top[1], top[2]);
      let bg = if row * 2 + 1 < rgb.height() {
        let bottom = rgb.get_pixel(col, row * 2 + 1);
        Color::Rgb(bottom[0], bottom[1], bottom[2])
      } else {
        Color::Reset
      };
      if let Some(cell) = buf.cell_mut((x0 + col as u16, y0 + row as u16)) {
        cell.set_char('▀').set_fg(fg).set_bg(bg);
      }
    }
  }
}

const LUMA_RAMP: &[u8] = b" .:-=+*#%@";

fn ascii_render(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let gray = image.to_luma8();
  let cols = gray.width().min(area.width as u32);
  let rows = gray.height().min(area.height as u32);
  let x0 = area.x + centered(area.width, cols);
  let y0 = area.y + centered(area.height, rows);

  for row in 0..rows {
    for col in 0..cols {
      let luma = gray.get_pixel(col, row)[0] as usize;
      let glyph = LUMA_RAMP[luma * (LUMA_RAMP.len() - 1) / 255] as char;
      if let Some(cell) = buf.cell_mut((x0 + col as u16, y0 + row as u16)) {
        cell.set_char(glyph);
      }
    }
  }
}

// --- Kitty graphics protocol ---
//
// The poster is PNG-encoded, base64'd, and streamed in <=4096-byte chunks:
//
//   first:  ESC _G a=T,f=100,t=d,i=1,p=1,c=<cols>,r=<rows>,q=2,m=1 ; <chunk> ESC \
//   middle: ESC _G m=1 ; <chunk> ESC \
//   last:   ESC _G m=0 ; <chunk> ESC \
//
// Fixed image id 1 / placement id 1 means a re-send atomically replaces the
// previous poster with no visible gap. c/r make the terminal scale the
// original pixels over the pane, so no pre-resize is needed here.

const KITTY_CHUNK: usize = 4096;

/// Delete every image this app has placed (pane change, exit).
pub fn kitty_clear_images() -> Result<()> {
  let mut out = std::io::stdout();
  write!(out, "\x1B_Ga=d,d=a,q=2\x1B\\").context("Failed to write kitty delete")?;
  out.flush().context("Failed to flush kitty delete")
}

/// Transmit `image` scaled over `area` via the Kitty graphics protocol.
pub fn kitty_show_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).context("Failed to encode poster as PNG")?;
  let payload = BASE64.encode(&png);
  let chunks: Vec<&[u8]> = payload.as_bytes().chunks(KITTY_CHUNK).collect();

  let mut out = std::io::stdout();
  write!(out, "\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1))
    .context("Failed to position cursor for kitty poster")?;

  for (i, chunk) in chunks.iter().enumerate() {
    let data = std::str::from_utf8(chunk).context("base64 chunk was not valid UTF-8")?;
    let more = usize::from(i + 1 < chunks.len());
    if i == 0 {
      write!(out, "\x1B_Ga=T,f=100,t=d,i=1,p=1,c={},r={},q=2,m={};{}\x1B\\", area.width, area.height, more, data)
    } else {
      write!(out, "\x1B_Gm={};{}\x1B\\", more, data)
    }
    .context("Failed to write kitty poster chunk")?;
  }
  out.flush().context("Failed to flush kitty poster")
}

// --- Sixel ---
//
// Sixel addresses pixels, six rows per band, one pass per color register.
// NeuQuant builds the 256-color palette. Within a band `$` rewinds to the
// left edge and `-` advances to the next band; runs longer than three
// pixels use the `!<n><glyph>` repeat introducer.

const SIXEL_COLORS: usize = 256;

/// Transmit `image` over `area` as sixel data, assuming 8x16 pixel cells.
pub fn sixel_show_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  let rgb = image.resize_to_fill(area.width as u32 * 8, area.height as u32 * 16, FilterType::Lanczos3).into_rgb8();
  let (w, h) = (rgb.width() as usize, rgb.height() as usize);

  let rgba: Vec<u8> = rgb.pixels().flat_map(|p| [p[0], p[1], p[2], 255]).collect();
  let quant = NeuQuant::new(3, SIXEL_COLORS, &rgba);
  let map = quant.color_map_rgb();
  let indices: Vec<u8> = rgb.pixels().map(|p| quant.index_of(&[p[0], p[1], p[2], 255]).min(255) as u8).collect();

  let mut out = String::with_capacity(w * h / 2);
  out.push_str("\x1BPq");
  out.push_str(&format!("\"1;1;{};{}", w, h));

  for reg in 0..SIXEL_COLORS {
    let c = &map[reg * 3..reg * 3 + 3];
    out.push_str(&format!(
      "#{};2;{};{};{}",
      reg,
      c[0] as u32 * 100 / 255,
      c[1] as u32 * 100 / 255,
      c[2] as u32 * 100 / 255
    ));
  }

  for band in 0..h.div_ceil(6) {
    for reg in 0..SIXEL_COLORS {
      let mut column_bits = vec![0u8; w];
      let mut any = false;
      for (x, bits) in column_bits.iter_mut().enumerate() {
        for dy in 0..6 {
          let y = band * 6 + dy;
          if y < h && indices[y * w + x] as usize == reg {
            *bits |= 1 << dy;
            any = true;
          }
        }
      }
      if !any {
        continue;
      }

      out.push_str(&format!("#{}", reg));
      for run in column_bits.chunk_by(|a, b| a == b) {
        let glyph = (run[0] + 0x3F) as char;
        if run.len() > 3 {
          out.push_str(&format!("!{}{}", run.len(), glyph));
        } else {
          out.extend(std::iter::repeat_n(glyph, run.len()));
        }
      }
      out.push('$');
    }
    out.push('-');
  }
  out.push_str("\x1B\\");

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H{}", area.y.saturating_add(1), area.x.saturating_add(1), out)
    .context("Failed to write sixel poster")?;
  stdout.flush().context("Failed to flush sixel poster")
}
