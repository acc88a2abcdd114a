//! Text measurement.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The same rectangle moved by `(dx, dy)`.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Measures where text ranges land on screen.
///
/// Both methods report viewport coordinates, so a caller can subtract the
/// overlay origin from a client rect.
pub trait MeasureSurface {
    /// Bounding box of the overlay container, or `None` if it is not laid
    /// out.
    fn bounding_rect(&self) -> Option<Rect>;

    /// One rectangle per visual line covered by chars `start..end` of
    /// `text`. A collapsed range yields a single zero-width caret rectangle.
    fn client_rects(&self, text: &str, start: usize, end: usize) -> Vec<Rect>;
}

/// Fixed-cell layout for a monospace text area.
#[derive(Clone, Debug, PartialEq)]
pub struct MonospaceLayout {
    origin: (f64, f64),
    char_width: f64,
    line_height: f64,
    /// Hard wrap column, `None` for no wrapping.
    columns: Option<usize>,
    scroll: (f64, f64),
}

impl MonospaceLayout {
    pub fn new(char_width: f64, line_height: f64) -> Self {
        Self {
            origin: (0.0, 0.0),
            char_width,
            line_height,
            columns: None,
            scroll: (0.0, 0.0),
        }
    }

    /// Place the text area at `(x, y)` in the viewport.
    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }

    /// Wrap lines after `columns` chars.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns.max(1));
        self
    }

    /// Scroll the text area by `(left, top)`.
    pub fn set_scroll(&mut self, left: f64, top: f64) {
        self.scroll = (left, top);
    }

    /// Visual `(row, column)` of the gap before char `index`.
    pub fn cell_of(&self, text: &str, index: usize) -> (usize, usize) {
        let (mut row, mut col) = (0, 0);
        for (i, ch) in text.chars().enumerate() {
            if ch == '\n' {
                if i == index {
                    return (row, col);
                }
                row += 1;
                col = 0;
                continue;
            }
            if self.columns.is_some_and(|w| col >= w) {
                row += 1;
                col = 0;
            }
            if i == index {
                return (row, col);
            }
            col += 1;
        }
        (row, col)
    }

    fn to_viewport(&self, row: usize, col: usize, cols: usize) -> Rect {
        Rect::new(
            self.origin.0 + col as f64 * self.char_width - self.scroll.0,
            self.origin.1 + row as f64 * self.line_height - self.scroll.1,
            cols as f64 * self.char_width,
            self.line_height,
        )
    }
}

impl MeasureSurface for MonospaceLayout {
    fn bounding_rect(&self) -> Option<Rect> {
        Some(Rect::new(self.origin.0, self.origin.1, 0.0, 0.0))
    }

    fn client_rects(&self, text: &str, start: usize, end: usize) -> Vec<Rect> {
        let len = text.chars().count();
        let (start, end) = (start.min(len), end.min(len));

        if start == end {
            let (row, col) = self.cell_of(text, start);
            return vec![self.to_viewport(row, col, 0)];
        }

        // Runs of (row, first column, width) for the selected chars
        let mut runs: Vec<(usize, usize, usize)> = Vec::new();
        let (mut row, mut col) = (0, 0);
        for (i, ch) in text.chars().enumerate().take(end) {
            if ch == '\n' {
                // A selected line break still marks its row
                if i >= start && !runs.last().is_some_and(|(r, _, _)| *r == row) {
                    runs.push((row, col, 0));
                }
                row += 1;
                col = 0;
                continue;
            }
            if self.columns.is_some_and(|w| col >= w) {
                row += 1;
                col = 0;
            }
            if i >= start {
                match runs.last_mut() {
                    Some((r, _, width)) if *r == row => *width += 1,
                    _ => runs.push((row, col, 1)),
                }
            }
            col += 1;
        }

        runs.into_iter()
            .map(|(row, col, width)| self.to_viewport(row, col, width))
            .collect()
    }
}
