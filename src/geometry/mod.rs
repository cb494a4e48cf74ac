//! Geometric primitives for stamp placement.
//!
//! OFD measures page space in millimetres with the origin at the top-left
//! corner; boxes are serialized as `ST_Box` strings: `"x y width height"`.

use crate::error::{Error, Result};
use std::fmt;

/// A rectangle in page space (millimetres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: f64,
    /// Y coordinate of top-left corner
    pub y: f64,
    /// Width of rectangle
    pub width: f64,
    /// Height of rectangle
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use ofd_oxide::geometry::Rect;
    ///
    /// let rect = Rect::new(10.0, 20.0, 40.0, 40.0);
    /// assert_eq!(rect.right(), 50.0);
    /// assert_eq!(rect.to_string(), "10 20 40 40");
    /// ```
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Parse an `ST_Box` string.
    ///
    /// ```
    /// use ofd_oxide::geometry::Rect;
    ///
    /// let rect = Rect::parse("0 0 210 297").unwrap();
    /// assert_eq!(rect.height, 297.0);
    /// assert!(Rect::parse("0 0 1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let nums = s
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::Xml(format!("invalid ST_Box '{}'", s)))?;
        match nums.as_slice() {
            [x, y, w, h] if *w >= 0.0 && *h >= 0.0 => Ok(Rect::new(*x, *y, *w, *h)),
            _ => Err(Error::Xml(format!("invalid ST_Box '{}'", s))),
        }
    }
}

fn fmt_num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            fmt_num(self.x),
            fmt_num(self.y),
            fmt_num(self.width),
            fmt_num(self.height)
        )
    }
}
