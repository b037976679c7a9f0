#![forbid(unsafe_code)]

//! Programmatic scroll-to-item targets.
//!
//! The engine is headless: it computes *where* the scroll container
//! should end up and the host applies or animates the move. Five
//! alignment policies:
//!
//! | Align | Target |
//! |-------|--------|
//! | `Start` | item top at viewport top |
//! | `Center` | item center at viewport center |
//! | `End` | item bottom at viewport bottom |
//! | `Auto` | nothing if fully visible, else nearest of start/end |
//! | `Smart` | nothing unless barely visible, then margin-adjusted |
//!
//! `Smart` only moves when less than [`SmartThresholds::min_visible`]
//! pixels of the item overlap the viewport, and lands with distinct
//! margins for upward and downward moves. The margins are product
//! tuning, not engine invariants, so they are configuration.
//!
//! Targets are always clamped to `[0, total_height - viewport_h]`.

use crate::estimate::DEFAULT_LINE_HEIGHT;
use crate::model::ListModel;

/// Default landing margin above an item when scrolling up to it.
pub const DEFAULT_SMART_TOP_MARGIN: f64 = 5.0;
/// Default landing margin below an item when scrolling down to it.
pub const DEFAULT_SMART_BOTTOM_MARGIN: f64 = 56.0;
/// Default visibility threshold under which `Smart` decides to move.
pub const DEFAULT_SMART_MIN_VISIBLE: f64 = DEFAULT_LINE_HEIGHT;

/// Alignment policy for [`scroll_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Scroll the minimum distance that makes the item fully visible.
    #[default]
    Auto,
    Start,
    Center,
    End,
    /// Like `Auto`, but tolerates partial visibility down to a
    /// threshold and lands with asymmetric margins.
    Smart,
}

/// Tuning for [`Align::Smart`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartThresholds {
    /// Gap left above the item after an upward scroll.
    pub top_margin: f64,
    /// Gap left below the item after a downward scroll.
    pub bottom_margin: f64,
    /// Visible pixels below which the item counts as not-visible.
    pub min_visible: f64,
}

impl Default for SmartThresholds {
    fn default() -> Self {
        Self {
            top_margin: DEFAULT_SMART_TOP_MARGIN,
            bottom_margin: DEFAULT_SMART_BOTTOM_MARGIN,
            min_visible: DEFAULT_SMART_MIN_VISIBLE,
        }
    }
}

/// Scroll offset that realizes `align` for `index`.
///
/// `None` means no scroll is needed (or the index is out of range).
/// The returned offset is clamped so the host can apply it verbatim.
#[must_use]
pub fn scroll_target(
    model: &ListModel,
    index: usize,
    align: Align,
    scroll_top: f64,
    viewport_h: f64,
    smart: &SmartThresholds,
) -> Option<f64> {
    if index >= model.len() {
        return None;
    }
    let start = model.offset_of(index);
    let end = start + model.height_of(index);
    let view_bottom = scroll_top + viewport_h;

    let target = match align {
        Align::Start => start,
        Align::End => end - viewport_h,
        Align::Center => (start + end) / 2.0 - viewport_h / 2.0,
        Align::Auto => {
            if start >= scroll_top && end <= view_bottom {
                return None;
            }
            if start < scroll_top {
                start
            } else {
                end - viewport_h
            }
        }
        Align::Smart => {
            let overlap = (end.min(view_bottom) - start.max(scroll_top)).max(0.0);
            if overlap >= smart.min_visible.min(model.height_of(index)) {
                return None;
            }
            if start < scroll_top {
                start - smart.top_margin
            } else {
                end - viewport_h + smart.bottom_margin
            }
        }
    };

    Some(clamp_target(target, model.total_height(), viewport_h))
}

fn clamp_target(target: f64, total: f64, viewport_h: f64) -> f64 {
    target.min((total - viewport_h).max(0.0)).max(0.0)
}
