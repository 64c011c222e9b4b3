//! Word-cloud layout and rendering.
//!
//! Layout works in canvas pixels against an occupancy grid and only needs a
//! [`TextMeasure`]; rendering draws the laid-out words with a real font at
//! `dpi / 100` times the layout size, under an optional title band.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_text_mut, text_size};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::error::RenderError;

/// DejaVu Sans, used when no font path is configured.
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Control points of the viridis colour map, evenly spaced over [0, 1].
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [72, 40, 120],
    [62, 73, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [110, 206, 88],
    [253, 231, 37],
];

pub const TITLE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Word-cloud appearance and layout parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloudOptions {
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    pub max_words: usize,
    /// 0 = size by rank only, 1 = size proportional to frequency.
    pub relative_scaling: f32,
    pub min_font_size: u32,
    /// Derived from the two most frequent words when unset.
    pub max_font_size: Option<u32>,
    pub font_step: u32,
    pub margin: u32,
    /// Probability of laying a word out horizontally.
    pub prefer_horizontal: f64,
    pub dpi: u32,
    /// Title size in points.
    pub title_font_size: f32,
    pub seed: Option<u64>,
    pub font: Option<PathBuf>,
}

impl Default for CloudOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            background: [255, 255, 255],
            max_words: 100,
            relative_scaling: 0.5,
            min_font_size: 10,
            max_font_size: None,
            font_step: 1,
            margin: 2,
            prefer_horizontal: 0.9,
            dpi: 300,
            title_font_size: 24.0,
            seed: None,
            font: None,
        }
    }
}

impl CloudOptions {
    /// Render scale relative to a 100 DPI canvas.
    pub fn scale(&self) -> f32 {
        self.dpi.max(1) as f32 / 100.0
    }
}

/// Measures the unrotated bounding box of a word at a font size.
pub trait TextMeasure {
    fn measure(&self, word: &str, font_size: u32) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    /// Rotated 90° counter-clockwise.
    Vertical,
}

impl Orientation {
    fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// A word with its place on the canvas. `x`/`y`/`width`/`height` describe the
/// reserved box (margin included) in layout pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub word: String,
    pub weight: f32,
    pub font_size: u32,
    pub orientation: Orientation,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub color: Rgb<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordCloud {
    pub width: u32,
    pub height: u32,
    pub words: Vec<PlacedWord>,
}

/// Lays out ranked `(word, count)` pairs. The input is expected in rank order,
/// as produced by [`crate::count_words`].
pub fn generate_cloud<M: TextMeasure>(
    ranked: &[(String, usize)],
    opts: &CloudOptions,
    measure: &M,
) -> Result<WordCloud, RenderError> {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let top = ranked.iter().take(opts.max_words).collect::<Vec<_>>();
    let max_count = top.first().map(|(_, c)| *c).unwrap_or(0);
    let weights: Vec<(&str, f32)> = top
        .iter()
        .map(|(w, c)| (w.as_str(), *c as f32 / max_count.max(1) as f32))
        .collect();
    if weights.is_empty() {
        return Ok(WordCloud {
            width: opts.width,
            height: opts.height,
            words: Vec::new(),
        });
    }

    let max_font = match opts.max_font_size {
        Some(size) => size,
        None => {
            let trial = layout_words(&weights[..weights.len().min(2)], opts, opts.height, measure, &mut rng);
            match trial.as_slice() {
                [] => return Err(RenderError::NoSpace),
                [only] => only.font_size,
                [a, b, ..] => {
                    let (a, b) = (a.font_size as f32, b.font_size as f32);
                    (2.0 * a * b / (a + b)).round() as u32
                }
            }
        }
    };
    debug!("Max font size {max_font}");

    let words = layout_words(&weights, opts, max_font, measure, &mut rng);
    if words.is_empty() {
        return Err(RenderError::NoSpace);
    }
    Ok(WordCloud {
        width: opts.width,
        height: opts.height,
        words,
    })
}

fn layout_words<M: TextMeasure>(
    weights: &[(&str, f32)],
    opts: &CloudOptions,
    max_font: u32,
    measure: &M,
    rng: &mut StdRng,
) -> Vec<PlacedWord> {
    let mut grid = Occupancy::new(opts.width, opts.height);
    let mut placed = Vec::new();
    let rs = opts.relative_scaling;
    let step = opts.font_step.max(1);
    let mut font_size = max_font;
    let mut last_weight = 1.0f32;

    for &(word, weight) in weights {
        if weight <= 0.0 {
            continue;
        }
        if rs != 0.0 {
            let scaled = (rs * (weight / last_weight) + (1.0 - rs)) * font_size as f32;
            font_size = scaled.round() as u32;
        }
        let mut orientation = if rng.r#gen::<f64>() < opts.prefer_horizontal {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };
        let mut tried_other = false;
        let mut spot = None;

        while font_size >= opts.min_font_size && font_size > 0 {
            let (tw, th) = measure.measure(word, font_size);
            let (bw, bh) = match orientation {
                Orientation::Horizontal => (tw, th),
                Orientation::Vertical => (th, tw),
            };
            let (bw, bh) = (bw + opts.margin, bh + opts.margin);
            if let Some((x, y)) = grid.find_position(bw, bh, rng) {
                spot = Some((x, y, bw, bh));
                break;
            }
            if !tried_other && opts.prefer_horizontal < 1.0 {
                orientation = orientation.flipped();
                tried_other = true;
            } else {
                font_size = font_size.saturating_sub(step);
                orientation = Orientation::Horizontal;
            }
        }

        // once nothing fits at the minimum size, smaller words will not fit either
        let Some((x, y, width, height)) = spot else {
            break;
        };
        grid.occupy(x, y, width, height);
        placed.push(PlacedWord {
            word: word.to_string(),
            weight,
            font_size,
            orientation,
            x,
            y,
            width,
            height,
            color: viridis(rng.r#gen::<f32>()),
        });
        last_weight = weight;
    }
    placed
}

/// Boolean occupancy grid with a summed-area table for O(1) box queries.
struct Occupancy {
    width: usize,
    height: usize,
    cells: Vec<bool>,
    integral: Vec<u32>,
}

impl Occupancy {
    fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            cells: vec![false; width * height],
            integral: vec![0; (width + 1) * (height + 1)],
        }
    }

    fn used(&self, x: usize, y: usize, w: usize, h: usize) -> u32 {
        let stride = self.width + 1;
        let at = |x: usize, y: usize| self.integral[y * stride + x];
        at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)
    }

    /// Uniformly random free top-left corner for a `w`×`h` box.
    fn find_position(&self, w: u32, h: u32, rng: &mut StdRng) -> Option<(u32, u32)> {
        let (w, h) = (w as usize, h as usize);
        if w == 0 || h == 0 || w > self.width || h > self.height {
            return None;
        }
        let free = |x: usize, y: usize| self.used(x, y, w, h) == 0;
        let (xs, ys) = (self.width - w + 1, self.height - h + 1);

        let hits = (0..ys)
            .flat_map(|y| (0..xs).map(move |x| (x, y)))
            .filter(|&(x, y)| free(x, y))
            .count();
        if hits == 0 {
            return None;
        }
        let goal = rng.gen_range(0..hits);
        (0..ys)
            .flat_map(|y| (0..xs).map(move |x| (x, y)))
            .filter(|&(x, y)| free(x, y))
            .nth(goal)
            .map(|(x, y)| (x as u32, y as u32))
    }

    fn occupy(&mut self, x: u32, y: u32, w: u32, h: u32) {
        let (x, y) = (x as usize, y as usize);
        let x_end = (x + w as usize).min(self.width);
        let y_end = (y + h as usize).min(self.height);
        for row in y..y_end {
            for col in x..x_end {
                self.cells[row * self.width + col] = true;
            }
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let stride = self.width + 1;
        for y in 0..self.height {
            let mut row_sum = 0u32;
            for x in 0..self.width {
                row_sum += self.cells[y * self.width + x] as u32;
                self.integral[(y + 1) * stride + x + 1] = self.integral[y * stride + x + 1] + row_sum;
            }
        }
    }
}

/// Samples the viridis colour map at `t` in [0, 1].
pub fn viridis(t: f32) -> Rgb<u8> {
    let pos = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - i as f32;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    let mix = |c: usize| ((1.0 - frac) * a[c] as f32 + frac * b[c] as f32).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Measures words with a loaded font, treating the font size as pixel height.
pub struct FontMeasure<'a> {
    font: &'a FontVec,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font: &'a FontVec) -> Self {
        Self { font }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn measure(&self, word: &str, font_size: u32) -> (u32, u32) {
        text_box(self.font, word, font_size as f32)
    }
}

fn text_box(font: &FontVec, text: &str, px: f32) -> (u32, u32) {
    let scale = PxScale::from(px);
    let (w, _) = text_size(scale, font, text);
    let scaled = font.as_scaled(scale);
    let h = (scaled.ascent() - scaled.descent()).ceil() as u32;
    (w + 1, h.max(1))
}

/// Loads the configured font, or the bundled DejaVu Sans when none is set.
pub fn load_font(path: Option<&Path>) -> Result<FontVec, RenderError> {
    let Some(path) = path else {
        debug!("Using the bundled font");
        return FontVec::try_from_vec(DEFAULT_FONT.to_vec()).map_err(|e| RenderError::InvalidFont {
            path: PathBuf::from("<bundled>"),
            reason: e.to_string(),
        });
    };
    debug!("Using font {}", path.display());
    let bytes = fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|e| RenderError::InvalidFont {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Draws the cloud at `opts.scale()` with the title (if any) in a band above it.
pub fn render_cloud(cloud: &WordCloud, font: &FontVec, opts: &CloudOptions, title: &str) -> RgbImage {
    let scale = opts.scale();
    let background = Rgb(opts.background);
    let width = (cloud.width as f32 * scale).round() as u32;
    let cloud_height = (cloud.height as f32 * scale).round() as u32;

    let title = title.trim();
    let title_px = opts.title_font_size * opts.dpi as f32 / 72.0;
    let band = if title.is_empty() {
        0
    } else {
        (title_px * 1.6).ceil() as u32
    };

    let mut canvas = RgbImage::from_pixel(width.max(1), (band + cloud_height).max(1), background);

    if band > 0 {
        let (tw, th) = text_box(font, title, title_px);
        let x = width.saturating_sub(tw) / 2;
        let y = band.saturating_sub(th) / 2;
        draw_text_mut(&mut canvas, TITLE_COLOR, x as i32, y as i32, PxScale::from(title_px), font, title);
    }

    let half_margin = opts.margin as f32 / 2.0;
    for w in &cloud.words {
        let px = w.font_size as f32 * scale;
        let (tw, th) = text_box(font, &w.word, px);
        let mut tile = RgbImage::from_pixel(tw, th, background);
        draw_text_mut(&mut tile, w.color, 0, 0, PxScale::from(px), font, &w.word);
        let tile = match w.orientation {
            Orientation::Horizontal => tile,
            Orientation::Vertical => imageops::rotate270(&tile),
        };
        let x = ((w.x as f32 + half_margin) * scale).round() as i64;
        let y = ((w.y as f32 + half_margin) * scale).round() as i64 + band as i64;
        imageops::replace(&mut canvas, &tile, x, y);
    }
    canvas
}

/// Writes the image; the format follows the file extension.
pub fn save_cloud(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    image.save(path)?;
    Ok(())
}

/// Opens the image in the platform viewer. Failures are only logged.
pub fn display_image(path: &Path) {
    let spawned = if cfg!(target_os = "macos") {
        Command::new("open").arg(path).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", ""]).arg(path).spawn()
    } else {
        Command::new("xdg-open").arg(path).spawn()
    };
    match spawned {
        Ok(_) => info!("Opened {} in the image viewer", path.display()),
        Err(e) => warn!("Could not open an image viewer for {}: {e}", path.display()),
    }
}
