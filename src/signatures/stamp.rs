//! Where a seal's appearance is drawn.
//!
//! Page geometry is supplied by the caller; nothing here reads page content.
//! All lengths are millimetres in page space, origin at the top left.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::xml::signature::StampAnnot;

/// Produces the `StampAnnot` placements of one appearance.
pub trait StampAppearance {
    /// Build the annotations, taking each annotation ID from `next_id`.
    fn annotations(&self, next_id: &mut dyn FnMut() -> String) -> Result<Vec<StampAnnot>>;
}

fn check_size(width: f64, height: f64) -> Result<()> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "stamp size {}x{} must be positive",
            width, height
        )));
    }
    Ok(())
}

/// A whole stamp on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalStampPos {
    /// ID of the page object
    pub page_ref: String,
    /// Appearance box
    pub boundary: Rect,
    /// Visible part of the appearance
    pub clip: Option<Rect>,
}

impl NormalStampPos {
    /// Place a `width` × `height` stamp with its top left corner at (`x`, `y`).
    pub fn new(page_ref: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page_ref: page_ref.into(),
            boundary: Rect::new(x, y, width, height),
            clip: None,
        }
    }

    /// Restrict the visible part.
    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }
}

impl StampAppearance for NormalStampPos {
    fn annotations(&self, next_id: &mut dyn FnMut() -> String) -> Result<Vec<StampAnnot>> {
        check_size(self.boundary.width, self.boundary.height)?;
        Ok(vec![StampAnnot {
            id: next_id(),
            page_ref: self.page_ref.clone(),
            boundary: self.boundary,
            clip: self.clip,
        }])
    }
}

/// Page edge a riding stamp straddles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Left edge
    Left,
    /// Right edge
    #[default]
    Right,
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
}

/// A page taking part in a riding stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRef {
    /// ID of the page object
    pub id: String,
    /// Page width
    pub width: f64,
    /// Page height
    pub height: f64,
}

impl PageRef {
    /// Describe a page.
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

/// A stamp split across the edges of consecutive pages.
///
/// Every page shows one slice of the full appearance; the slices line up
/// when the pages are fanned out along `side`.
#[derive(Debug, Clone, PartialEq)]
pub struct RidingStampPos {
    /// Edge the stamp sits on
    pub side: Side,
    /// Distance of the stamp from the page origin along the edge; centred when `None`
    pub offset: Option<f64>,
    /// Full stamp width
    pub width: f64,
    /// Full stamp height
    pub height: f64,
    /// Pages in reading order
    pub pages: Vec<PageRef>,
}

impl RidingStampPos {
    /// A stamp centred on the right edges of `pages`.
    pub fn new(pages: Vec<PageRef>, width: f64, height: f64) -> Self {
        Self {
            side: Side::Right,
            offset: None,
            width,
            height,
            pages,
        }
    }

    /// Choose the edge.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Fix the position along the edge.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl StampAppearance for RidingStampPos {
    fn annotations(&self, next_id: &mut dyn FnMut() -> String) -> Result<Vec<StampAnnot>> {
        check_size(self.width, self.height)?;
        if self.pages.is_empty() {
            return Err(Error::InvalidArgument(
                "a riding stamp needs at least one page".to_string(),
            ));
        }
        let n = self.pages.len();
        let mut annots = Vec::with_capacity(n);
        for (i, page) in self.pages.iter().enumerate() {
            // slice index counted from the slice nearest the page origin
            let rev = (n - 1 - i) as f64;
            let i = i as f64;
            let (x, y, clip) = match self.side {
                Side::Right | Side::Left => {
                    let slice = self.width / n as f64;
                    let y = self
                        .offset
                        .unwrap_or(page.height / 2.0 - self.height / 2.0);
                    if self.side == Side::Right {
                        let clip = Rect::new(i * slice, 0.0, slice, self.height);
                        (page.width - slice * (i + 1.0), y, clip)
                    } else {
                        let clip = Rect::new(rev * slice, 0.0, slice, self.height);
                        (-slice * rev, y, clip)
                    }
                },
                Side::Bottom | Side::Top => {
                    let slice = self.height / n as f64;
                    let x = self.offset.unwrap_or(page.width / 2.0 - self.width / 2.0);
                    if self.side == Side::Bottom {
                        let clip = Rect::new(0.0, i * slice, self.width, slice);
                        (x, page.height - slice * (i + 1.0), clip)
                    } else {
                        let clip = Rect::new(0.0, rev * slice, self.width, slice);
                        (x, -slice * rev, clip)
                    }
                },
            };
            annots.push(StampAnnot {
                id: next_id(),
                page_ref: page.id.clone(),
                boundary: Rect::new(x, y, self.width, self.height),
                clip: Some(clip),
            });
        }
        Ok(annots)
    }
}

/// How one cutting stamp divides between the two pages it joins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuttingRatio {
    /// Share shown on the earlier page
    pub left: f64,
    /// Share shown on the later page
    pub right: f64,
}

impl CuttingRatio {
    /// Split a stamp `left` : `right`.
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    fn check(&self) -> Result<()> {
        let valid = |share: f64| share.is_finite() && (0.0..=1.0).contains(&share);
        if !(valid(self.left) && valid(self.right)) {
            return Err(Error::InvalidArgument(format!(
                "cutting ratio {}:{} must lie between 0 and 1",
                self.left, self.right
            )));
        }
        Ok(())
    }
}

impl Default for CuttingRatio {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// Whole stamps cut across the gap between each pair of neighbouring pages.
///
/// Unlike [`RidingStampPos`], which spreads one stamp over every page, each
/// pair of consecutive pages shares its own stamp: page `k` shows the
/// leading part at its edge and page `k + 1` the remainder at the opposite
/// edge, as when the pages lie side by side. A document of `n` pages gets
/// `n - 1` stamps and `2(n - 1)` annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingRideStampPos {
    /// Edge of the earlier page the stamp crosses; only `Left` and `Right` apply
    pub side: Side,
    /// Distance of the stamp from the top of the page; centred when `None`
    pub offset: Option<f64>,
    /// Full stamp width
    pub width: f64,
    /// Full stamp height
    pub height: f64,
    /// Distance kept from the page edge
    pub margin: f64,
    /// Split of the stamp between page `k` and page `k + 1`; missing entries split evenly
    pub ratios: Vec<CuttingRatio>,
    /// Pages in reading order
    pub pages: Vec<PageRef>,
}

impl CuttingRideStampPos {
    /// Stamps centred on the right edges, split evenly.
    pub fn new(pages: Vec<PageRef>, width: f64, height: f64) -> Self {
        Self {
            side: Side::Right,
            offset: None,
            width,
            height,
            margin: 0.0,
            ratios: Vec::new(),
            pages,
        }
    }

    /// Choose the edge.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Fix the vertical position.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Keep `margin` from the page edge.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Split each stamp unevenly.
    pub fn with_ratios(mut self, ratios: Vec<CuttingRatio>) -> Self {
        self.ratios = ratios;
        self
    }

    fn ratio(&self, gap: usize) -> CuttingRatio {
        self.ratios.get(gap).copied().unwrap_or_default()
    }

    /// Position and clip of a `shown`-wide part of the stamp against the page's `side` edge.
    fn at_side(&self, page: &PageRef, shown: f64, side: Side) -> (f64, Rect) {
        match side {
            Side::Right => (
                page.width - shown - self.margin,
                Rect::new(0.0, 0.0, shown, self.height),
            ),
            _ => (
                shown - self.width + self.margin,
                Rect::new(self.width - shown, 0.0, shown, self.height),
            ),
        }
    }
}

impl StampAppearance for CuttingRideStampPos {
    fn annotations(&self, next_id: &mut dyn FnMut() -> String) -> Result<Vec<StampAnnot>> {
        check_size(self.width, self.height)?;
        let (lead, trail) = match self.side {
            Side::Right => (Side::Right, Side::Left),
            Side::Left => (Side::Left, Side::Right),
            side => {
                return Err(Error::InvalidArgument(format!(
                    "cutting stamps join pages side by side, not along the {:?} edge",
                    side
                )))
            },
        };
        if self.pages.len() < 2 {
            return Err(Error::InvalidArgument(
                "a cutting stamp needs at least two pages".to_string(),
            ));
        }
        for ratio in &self.ratios {
            ratio.check()?;
        }

        let last = self.pages.len() - 1;
        let mut annots = Vec::with_capacity(2 * last);
        for (i, page) in self.pages.iter().enumerate() {
            let y = self.offset.unwrap_or(page.height / 2.0 - self.height / 2.0);
            let mut parts = Vec::with_capacity(2);
            // stamp shared with the next page, then the one shared with the previous page
            if i < last {
                parts.push(self.at_side(page, self.width * self.ratio(i).left, lead));
            }
            if i > 0 {
                parts.push(self.at_side(page, self.width * self.ratio(i - 1).right, trail));
            }
            for (x, clip) in parts {
                annots.push(StampAnnot {
                    id: next_id(),
                    page_ref: page.id.clone(),
                    boundary: Rect::new(x, y, self.width, self.height),
                    clip: Some(clip),
                });
            }
        }
        Ok(annots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> impl FnMut() -> String {
        let mut n = 0;
        move || {
            n += 1;
            n.to_string()
        }
    }

    #[test]
    fn test_normal_stamp() {
        let pos = NormalStampPos::new("4", 10.0, 20.0, 40.0, 40.0);
        let annots = pos.annotations(&mut counter()).unwrap();
        assert_eq!(annots.len(), 1);
        assert_eq!(annots[0].id, "1");
        assert_eq!(annots[0].page_ref, "4");
        assert_eq!(annots[0].boundary, Rect::new(10.0, 20.0, 40.0, 40.0));
        assert!(annots[0].clip.is_none());
    }

    #[test]
    fn test_zero_size_rejected() {
        let pos = NormalStampPos::new("4", 0.0, 0.0, 0.0, 40.0);
        assert!(pos.annotations(&mut counter()).is_err());
        let riding = RidingStampPos::new(vec![], 40.0, 40.0);
        assert!(riding.annotations(&mut counter()).is_err());
    }

    #[test]
    fn test_riding_right_edge() {
        let pages = vec![PageRef::new("1", 210.0, 297.0), PageRef::new("2", 210.0, 297.0)];
        let annots = RidingStampPos::new(pages, 40.0, 40.0)
            .annotations(&mut counter())
            .unwrap();
        assert_eq!(annots.len(), 2);
        assert_eq!(annots[0].boundary, Rect::new(190.0, 128.5, 40.0, 40.0));
        assert_eq!(annots[0].clip, Some(Rect::new(0.0, 0.0, 20.0, 40.0)));
        assert_eq!(annots[1].boundary, Rect::new(170.0, 128.5, 40.0, 40.0));
        assert_eq!(annots[1].clip, Some(Rect::new(20.0, 0.0, 20.0, 40.0)));
        assert_eq!(annots[1].id, "2");
    }

    #[test]
    fn test_riding_left_edge() {
        let pages = vec![PageRef::new("1", 210.0, 297.0), PageRef::new("2", 210.0, 297.0)];
        let annots = RidingStampPos::new(pages, 40.0, 40.0)
            .with_side(Side::Left)
            .with_offset(10.0)
            .annotations(&mut counter())
            .unwrap();
        assert_eq!(annots[0].boundary, Rect::new(-20.0, 10.0, 40.0, 40.0));
        assert_eq!(annots[0].clip, Some(Rect::new(20.0, 0.0, 20.0, 40.0)));
        assert_eq!(annots[1].boundary, Rect::new(0.0, 10.0, 40.0, 40.0));
        assert_eq!(annots[1].clip, Some(Rect::new(0.0, 0.0, 20.0, 40.0)));
    }

    #[test]
    fn test_riding_bottom_edge() {
        let pages = vec![
            PageRef::new("1", 200.0, 300.0),
            PageRef::new("2", 200.0, 300.0),
            PageRef::new("3", 200.0, 300.0),
            PageRef::new("4", 200.0, 300.0),
        ];
        let annots = RidingStampPos::new(pages, 40.0, 40.0)
            .with_side(Side::Bottom)
            .annotations(&mut counter())
            .unwrap();
        assert_eq!(annots.len(), 4);
        assert_eq!(annots[3].boundary, Rect::new(80.0, 260.0, 40.0, 40.0));
        assert_eq!(annots[3].clip, Some(Rect::new(0.0, 30.0, 40.0, 10.0)));
    }

    fn pages(n: usize) -> Vec<PageRef> {
        (1..=n).map(|i| PageRef::new(i.to_string(), 210.0, 297.0)).collect()
    }

    #[test]
    fn test_cutting_right_edge() {
        let annots = CuttingRideStampPos::new(pages(3), 40.0, 40.0)
            .annotations(&mut counter())
            .unwrap();
        let placed: Vec<_> = annots.iter().map(|a| (a.page_ref.as_str(), a.boundary.x)).collect();
        assert_eq!(placed, [("1", 190.0), ("2", 190.0), ("2", -20.0), ("3", -20.0)]);
        assert_eq!(annots[0].clip, Some(Rect::new(0.0, 0.0, 20.0, 40.0)));
        assert_eq!(annots[2].clip, Some(Rect::new(20.0, 0.0, 20.0, 40.0)));
        assert_eq!(annots[3].boundary, Rect::new(-20.0, 128.5, 40.0, 40.0));
        assert_eq!(annots[3].id, "4");
    }

    #[test]
    fn test_cutting_ratios_and_margin() {
        let annots = CuttingRideStampPos::new(pages(2), 40.0, 40.0)
            .with_side(Side::Left)
            .with_margin(2.0)
            .with_offset(30.0)
            .with_ratios(vec![CuttingRatio::new(0.25, 0.75)])
            .annotations(&mut counter())
            .unwrap();
        assert_eq!(annots.len(), 2);
        // page 1 shows a quarter at its left edge
        assert_eq!(annots[0].boundary, Rect::new(-28.0, 30.0, 40.0, 40.0));
        assert_eq!(annots[0].clip, Some(Rect::new(30.0, 0.0, 10.0, 40.0)));
        // page 2 shows the rest at its right edge
        assert_eq!(annots[1].boundary, Rect::new(178.0, 30.0, 40.0, 40.0));
        assert_eq!(annots[1].clip, Some(Rect::new(0.0, 0.0, 30.0, 40.0)));
    }

    #[test]
    fn test_cutting_rejects_bad_input() {
        let one = CuttingRideStampPos::new(pages(1), 40.0, 40.0);
        assert!(one.annotations(&mut counter()).is_err());
        let top = CuttingRideStampPos::new(pages(2), 40.0, 40.0).with_side(Side::Top);
        assert!(top.annotations(&mut counter()).is_err());
        let ratio = CuttingRideStampPos::new(pages(2), 40.0, 40.0)
            .with_ratios(vec![CuttingRatio::new(1.5, -0.5)]);
        assert!(ratio.annotations(&mut counter()).is_err());
    }
}
