// ============================================================
// Layer 6 — Visualizer
// ============================================================
// Renders PNG files for a human to look at. Nothing reads
// them back.
//
//   accuracy.png / loss.png
//       Line chart per metric: title, training series in
//       blue, validation series in orange, legend, light grid,
//       "epoch" ticks on the x axis and value ticks on the
//       (labelled) y axis.
//
//   predictions.png / inference.png / misclassified.png
//       Grid of 28x28 thumbnails (scaled up, "blues" colour
//       map) with the predicted digit drawn underneath:
//         green → prediction matches the expected digit
//         red   → prediction is wrong
//         black → no expected digit known
//
// Text is drawn with a tiny built-in 3x5 bitmap font:
// digits, lowercase letters, '.' and '-'.
//
// Reference: image / imageproc crate documentation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

use crate::domain::image::{Label, NormalizedImage, HEIGHT, WIDTH};
use crate::infra::metrics::History;

const WHITE:  Rgb<u8> = Rgb([255, 255, 255]);
const BLACK:  Rgb<u8> = Rgb([0, 0, 0]);
const GRID:   Rgb<u8> = Rgb([225, 225, 225]);
const BLUE:   Rgb<u8> = Rgb([31, 119, 180]);
const ORANGE: Rgb<u8> = Rgb([255, 127, 14]);
const GREEN:  Rgb<u8> = Rgb([0, 140, 0]);
const RED:    Rgb<u8> = Rgb([200, 0, 0]);

const CHART_WIDTH:  u32 = 640;
const CHART_HEIGHT: u32 = 400;
const MARGIN_LEFT:   f32 = 60.0;
const MARGIN_RIGHT:  f32 = 20.0;
const MARGIN_TOP:    f32 = 30.0;
const MARGIN_BOTTOM: f32 = 40.0;
const Y_TICKS: usize = 5;

const THUMB_SCALE:  u32 = 3;
const CELL_PADDING: u32 = 8;
const LABEL_HEIGHT: u32 = 28;
const LABEL_SCALE:  u32 = 4;

// ─── Bitmap font ──────────────────────────────────────────────────────────────

/// 3x5 glyph, one row per entry, bit 2 is the leftmost column
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c.to_ascii_lowercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        'a' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'b' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'd' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'f' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'g' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'h' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'k' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'n' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'o' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'p' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'r' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' => [0b011, 0b100, 0b010, 0b001, 0b110],
        't' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'w' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'x' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        _ => return None,
    };
    Some(rows)
}

/// Width in pixels of `text` drawn at `scale`
fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    (n * 4 * scale).saturating_sub(scale)
}

/// Draw `text` with its top-left corner at (x, y). Unknown characters
/// leave a blank.
fn draw_text(canvas: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let mut cursor = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        let px = cursor + (col * scale) as i32;
                        let py = y + (row as u32 * scale) as i32;
                        draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(scale, scale), color);
                    }
                }
            }
        }
        cursor += (4 * scale) as i32;
    }
}

/// Draw `text` top to bottom, one character per line.
fn draw_text_vertical(canvas: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let cy = y + (i as u32 * 6 * scale) as i32;
        draw_text(canvas, c.encode_utf8(&mut [0; 4]), x, cy, scale, color);
    }
}

// ─── Line charts ──────────────────────────────────────────────────────────────

/// Maps (epoch, value) into pixel space of the plot area.
struct Axes {
    first_epoch: f64,
    last_epoch:  f64,
    min:         f64,
    max:         f64,
}

impl Axes {
    fn fit(series: &[&[(usize, f64)]]) -> Self {
        let points = || series.iter().flat_map(|s| s.iter()).filter(|(_, v)| v.is_finite());

        let first_epoch = points().map(|(e, _)| *e).min().unwrap_or(1) as f64;
        let last_epoch  = points().map(|(e, _)| *e).max().unwrap_or(1) as f64;
        let mut min = points().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let mut max = points().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);

        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 1.0;
        }
        if (max - min).abs() < 1e-9 {
            min -= 0.5;
            max += 0.5;
        }
        let pad = (max - min) * 0.05;
        Self { first_epoch, last_epoch, min: min - pad, max: max + pad }
    }

    fn x(&self, epoch: f64) -> f32 {
        let width = CHART_WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT;
        if self.last_epoch <= self.first_epoch {
            return MARGIN_LEFT + width / 2.0;
        }
        let t = (epoch - self.first_epoch) / (self.last_epoch - self.first_epoch);
        MARGIN_LEFT + t as f32 * width
    }

    fn y(&self, value: f64) -> f32 {
        let height = CHART_HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;
        let t = (value - self.min) / (self.max - self.min);
        CHART_HEIGHT as f32 - MARGIN_BOTTOM - t as f32 * height
    }
}

fn draw_series(canvas: &mut RgbImage, axes: &Axes, points: &[(usize, f64)], color: Rgb<u8>) {
    let pixels: Vec<(f32, f32)> = points
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|&(e, v)| (axes.x(e as f64), axes.y(v)))
        .collect();

    for pair in pixels.windows(2) {
        // three parallel segments for a 3px line
        for offset in [-1.0f32, 0.0, 1.0] {
            draw_line_segment_mut(
                canvas,
                (pair[0].0, pair[0].1 + offset),
                (pair[1].0, pair[1].1 + offset),
                color,
            );
        }
    }
    for &(x, y) in &pixels {
        draw_filled_rect_mut(canvas, Rect::at(x as i32 - 3, y as i32 - 3).of_size(7, 7), color);
    }
}

/// Render one metric: training vs validation per epoch.
pub fn render_metric_chart(
    metric:     &str,
    train:      &[(usize, f64)],
    validation: &[(usize, f64)],
) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let axes = Axes::fit(&[train, validation]);

    let left   = MARGIN_LEFT;
    let right  = CHART_WIDTH as f32 - MARGIN_RIGHT;
    let top    = MARGIN_TOP;
    let bottom = CHART_HEIGHT as f32 - MARGIN_BOTTOM;

    // ── Horizontal grid + value ticks ─────────────────────────────────────────
    for i in 0..=Y_TICKS {
        let value = axes.min + (axes.max - axes.min) * i as f64 / Y_TICKS as f64;
        let y = axes.y(value);
        draw_line_segment_mut(&mut canvas, (left, y), (right, y), GRID);
        let label = format!("{value:.2}");
        let x = left as i32 - 6 - text_width(&label, 2) as i32;
        draw_text(&mut canvas, &label, x, y as i32 - 5, 2, BLACK);
    }

    // ── Vertical grid + epoch ticks ───────────────────────────────────────────
    let mut epochs: Vec<usize> = train.iter().chain(validation).map(|(e, _)| *e).collect();
    epochs.sort_unstable();
    epochs.dedup();
    for epoch in epochs {
        let x = axes.x(epoch as f64);
        draw_line_segment_mut(&mut canvas, (x, top), (x, bottom), GRID);
        let label = epoch.to_string();
        let lx = x as i32 - text_width(&label, 2) as i32 / 2;
        draw_text(&mut canvas, &label, lx, bottom as i32 + 8, 2, BLACK);
    }

    // ── Axes ──────────────────────────────────────────────────────────────────
    draw_line_segment_mut(&mut canvas, (left, top), (left, bottom), BLACK);
    draw_line_segment_mut(&mut canvas, (left, bottom), (right, bottom), BLACK);

    draw_series(&mut canvas, &axes, train, BLUE);
    draw_series(&mut canvas, &axes, validation, ORANGE);

    // ── Title and axis labels ─────────────────────────────────────────────────
    let title = format!("model {metric}");
    let tx = (CHART_WIDTH as i32 - text_width(&title, 3) as i32) / 2;
    draw_text(&mut canvas, &title, tx, 8, 3, BLACK);

    let xl = "epoch";
    let xx = (left + right) as i32 / 2 - text_width(xl, 2) as i32 / 2;
    draw_text(&mut canvas, xl, xx, bottom as i32 + 24, 2, BLACK);
    draw_text_vertical(&mut canvas, metric, 4, top as i32 + 10, 2, BLACK);

    // ── Legend ────────────────────────────────────────────────────────────────
    let mut lx = right as i32 - 140;
    for (name, color, points) in [("train", BLUE, train), ("val", ORANGE, validation)] {
        if points.is_empty() {
            continue;
        }
        draw_filled_rect_mut(&mut canvas, Rect::at(lx, 10).of_size(20, 8), color);
        draw_text(&mut canvas, name, lx + 24, 9, 2, BLACK);
        lx += 24 + text_width(name, 2) as i32 + 12;
    }

    canvas
}

/// Write accuracy.png and loss.png into `dir`.
pub fn save_training_curves(history: &History, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;

    let accuracy = dir.join("accuracy.png");
    save_png(&render_metric_chart("accuracy", &history.accuracy(), &history.val_accuracy()), &accuracy)?;

    let loss = dir.join("loss.png");
    save_png(&render_metric_chart("loss", &history.loss(), &history.val_loss()), &loss)?;

    tracing::info!("Wrote training curves to '{}'", dir.display());
    Ok((accuracy, loss))
}

// ─── Thumbnail grids ──────────────────────────────────────────────────────────

/// One image to show together with what the model said about it.
#[derive(Debug, Clone)]
pub struct Thumbnail<'a> {
    pub image:     &'a NormalizedImage,
    pub predicted: Label,
    pub expected:  Option<Label>,
}

impl Thumbnail<'_> {
    fn label_color(&self) -> Rgb<u8> {
        match self.expected {
            Some(e) if e == self.predicted => GREEN,
            Some(_) => RED,
            None => BLACK,
        }
    }
}

/// White → dark blue
fn blues(v: f32) -> Rgb<u8> {
    let t = v.clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32| (a + (b - a) * t).round() as u8;
    Rgb([lerp(247.0, 8.0), lerp(251.0, 48.0), lerp(255.0, 107.0)])
}

fn cell_size() -> (u32, u32) {
    let w = WIDTH as u32 * THUMB_SCALE + 2 * CELL_PADDING;
    let h = HEIGHT as u32 * THUMB_SCALE + LABEL_HEIGHT + 2 * CELL_PADDING;
    (w, h)
}

/// Lay thumbnails out `cols` per row.
pub fn render_prediction_grid(thumbnails: &[Thumbnail<'_>], cols: usize) -> RgbImage {
    let cols = cols.max(1).min(thumbnails.len().max(1));
    let rows = thumbnails.len().div_ceil(cols).max(1);
    let (cell_w, cell_h) = cell_size();
    let mut canvas = RgbImage::from_pixel(cols as u32 * cell_w, rows as u32 * cell_h, WHITE);

    for (i, thumb) in thumbnails.iter().enumerate() {
        let ox = (i % cols) as u32 * cell_w + CELL_PADDING;
        let oy = (i / cols) as u32 * cell_h + CELL_PADDING;

        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let color = blues(thumb.image.get(x, y));
                let rect = Rect::at((ox + x as u32 * THUMB_SCALE) as i32, (oy + y as u32 * THUMB_SCALE) as i32)
                    .of_size(THUMB_SCALE, THUMB_SCALE);
                draw_filled_rect_mut(&mut canvas, rect, color);
            }
        }

        let side = WIDTH as u32 * THUMB_SCALE;
        let color = thumb.label_color();
        draw_hollow_rect_mut(&mut canvas, Rect::at(ox as i32, oy as i32).of_size(side, side), color);

        let text = thumb.predicted.to_string();
        let tx = ox + (side - text_width(&text, LABEL_SCALE)) / 2;
        let ty = oy + side + (LABEL_HEIGHT - 5 * LABEL_SCALE) / 2;
        draw_text(&mut canvas, &text, tx as i32, ty as i32, LABEL_SCALE, color);
    }

    canvas
}

/// Write a thumbnail grid. An empty list writes nothing and removes
/// any grid an earlier run left at `path`.
pub fn save_prediction_grid(thumbnails: &[Thumbnail<'_>], cols: usize, path: &Path) -> Result<bool> {
    if thumbnails.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Cannot remove stale image '{}'", path.display()))?;
        }
        return Ok(false);
    }
    save_png(&render_prediction_grid(thumbnails, cols), path)?;
    tracing::info!("Wrote {} thumbnails to '{}'", thumbnails.len(), path.display());
    Ok(true)
}

fn save_png(canvas: &RgbImage, path: &Path) -> Result<()> {
    canvas
        .save(path)
        .with_context(|| format!("Cannot write image '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::Preprocessor;
    use crate::domain::image::Image;
    use crate::infra::metrics::EpochMetrics;

    fn history() -> History {
        let mut h = History::default();
        for epoch in 1..=5 {
            h.push(EpochMetrics {
                epoch,
                loss: 1.0 / epoch as f64,
                accuracy: 0.8 + epoch as f64 * 0.03,
                val_loss: Some(1.2 / epoch as f64),
                val_accuracy: Some(0.78 + epoch as f64 * 0.03),
            });
        }
        h
    }

    fn count(canvas: &RgbImage, color: Rgb<u8>) -> usize {
        canvas.pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn test_chart_draws_both_series() {
        let h = history();
        let chart = render_metric_chart("loss", &h.loss(), &h.val_loss());
        assert_eq!(chart.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
        assert!(count(&chart, BLUE) > 100);
        assert!(count(&chart, ORANGE) > 100);
    }

    #[test]
    fn test_chart_survives_single_epoch_and_nan() {
        let chart = render_metric_chart("loss", &[(1, f64::NAN)], &[]);
        assert_eq!(chart.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
        assert_eq!(count(&chart, ORANGE), 0);

        let chart = render_metric_chart("accuracy", &[(1, 0.5)], &[(1, 0.5)]);
        assert!(count(&chart, BLUE) > 0);
    }

    #[test]
    fn test_chart_has_title_axis_labels_and_legend() {
        for text in ["model accuracy", "model loss", "epoch", "train", "val"] {
            assert!(text.chars().all(|c| c == ' ' || glyph(c).is_some()), "{text}");
        }

        let h = history();
        let chart = render_metric_chart("accuracy", &h.accuracy(), &h.val_accuracy());
        let black_in = |x0: u32, y0: u32, x1: u32, y1: u32| {
            (y0..y1)
                .flat_map(|y| (x0..x1).map(move |x| (x, y)))
                .filter(|&(x, y)| *chart.get_pixel(x, y) == BLACK)
                .count()
        };

        let title = "model accuracy";
        let tx = (CHART_WIDTH - text_width(title, 3)) / 2;
        assert!(black_in(tx, 8, tx + text_width(title, 3), 23) > 50, "title");
        assert!(black_in(0, MARGIN_TOP as u32, 16, CHART_HEIGHT / 2) > 20, "metric label");
        let bottom = CHART_HEIGHT - MARGIN_BOTTOM as u32;
        assert!(black_in(MARGIN_LEFT as u32, bottom + 24, CHART_WIDTH, bottom + 34) > 20, "epoch label");

        // legend text sits right of the title
        let legend = CHART_WIDTH - MARGIN_RIGHT as u32 - 140;
        assert!(black_in(legend, 9, CHART_WIDTH, 19) > 40, "legend");
    }

    #[test]
    fn test_save_training_curves() {
        let dir = tempfile::tempdir().unwrap();
        let (acc, loss) = save_training_curves(&history(), dir.path()).unwrap();
        assert!(acc.exists());
        assert!(loss.exists());
    }

    #[test]
    fn test_grid_layout_and_colours() {
        let p = Preprocessor::new();
        let image = p.normalize(&Image::blank());
        let one = Label::new(1).unwrap();
        let two = Label::new(2).unwrap();

        let thumbs = vec![
            Thumbnail { image: &image, predicted: one, expected: Some(one) },
            Thumbnail { image: &image, predicted: two, expected: Some(one) },
            Thumbnail { image: &image, predicted: one, expected: None },
        ];
        let grid = render_prediction_grid(&thumbs, 2);
        let (cell_w, cell_h) = cell_size();
        assert_eq!(grid.dimensions(), (2 * cell_w, 2 * cell_h));
        assert!(count(&grid, GREEN) > 0);
        assert!(count(&grid, RED) > 0);
        // blank images render as the lightest blue
        assert!(count(&grid, blues(0.0)) > 3 * 28 * 28);
    }

    #[test]
    fn test_empty_grid_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.png");
        assert!(!save_prediction_grid(&[], 5, &path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_grid_removes_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("misclassified.png");
        std::fs::write(&path, b"from an earlier run").unwrap();

        assert!(!save_prediction_grid(&[], 5, &path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("7", 4), 12);
        assert_eq!(text_width("0.95", 2), 30);
        assert_eq!(text_width("", 2), 0);
    }
}
