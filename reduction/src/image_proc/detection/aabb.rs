//! Axis-aligned pixel rectangles.
//!
//! Used for the footprint of detected objects and for the clipped square
//! windows that photometry and centroiding scan around a position.
//!
//! # Examples
//!
//! ```rust
//! use reduction::image_proc::detection::aabb::AABB;
//! use shared::image_size::ImageSize;
//!
//! let mut footprint = AABB::new();
//! footprint.expand_to_include(12, 40);
//! footprint.expand_to_include(15, 43);
//! assert_eq!(footprint.width(), 4);
//! assert_eq!(footprint.area(), 16);
//!
//! // 7x7 window around (1.2, 30.0), clipped at the left edge
//! let window = AABB::around(1.2, 30.0, 3.0, ImageSize::from_width_height(64, 64)).unwrap();
//! assert_eq!((window.min_x, window.max_x), (0, 4));
//! ```

use shared::image_size::ImageSize;

/// Inclusive rectangle `[min_x, max_x] × [min_y, max_y]` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AABB {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl AABB {
    /// Empty box that becomes valid once a point is added with
    /// [`expand_to_include`](Self::expand_to_include).
    pub fn new() -> Self {
        Self {
            min_x: usize::MAX,
            min_y: usize::MAX,
            max_x: 0,
            max_y: 0,
        }
    }

    pub fn from_coords(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Square window of half-size `ceil(radius)` around `(x, y)`, clipped to
    /// the frame. `None` if the window misses the frame entirely.
    pub fn around(x: f64, y: f64, radius: f64, frame: ImageSize) -> Option<Self> {
        if frame.is_empty() || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let r = radius.max(0.0).ceil();
        let clip = |v: f64, len: usize| v.clamp(0.0, (len - 1) as f64) as usize;
        let (x0, x1) = (x.round() - r, x.round() + r);
        let (y0, y1) = (y.round() - r, y.round() + r);
        if x1 < 0.0 || y1 < 0.0 || x0 > (frame.width - 1) as f64 || y0 > (frame.height - 1) as f64 {
            return None;
        }
        Some(Self {
            min_x: clip(x0, frame.width),
            min_y: clip(y0, frame.height),
            max_x: clip(x1, frame.width),
            max_y: clip(y1, frame.height),
        })
    }

    pub fn expand_to_include(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn width(&self) -> usize {
        if self.is_valid() {
            self.max_x - self.min_x + 1
        } else {
            0
        }
    }

    pub fn height(&self) -> usize {
        if self.is_valid() {
            self.max_y - self.min_y + 1
        } else {
            0
        }
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn contains_point(&self, x: usize, y: usize) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Center in pixel coordinates `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) as f64 / 2.0,
            (self.min_y + self.max_y) as f64 / 2.0,
        )
    }

    /// Iterate over `(x, y)` in raster order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> {
        let (x0, x1) = (self.min_x, self.max_x);
        let rows = if self.is_valid() {
            self.min_y..self.max_y + 1
        } else {
            0..0
        };
        rows.flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::new()
    }
}
