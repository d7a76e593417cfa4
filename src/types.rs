//! Common types and numeric helpers shared by every packing stage.
//!
//! All floating-point tie-breaks in the engine go through [`compare_with_epsilon`]
//! so that two runs over identical inputs always pick the same winner.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

/// Global numerical tolerance for volume and void-ratio comparisons.
///
/// Part of the public surface: callers comparing `void_ratio` or box volumes
/// for their own tie-breaks must use the same value to avoid flapping results.
pub const EPSILON: f64 = 1e-6;

/// Upper bound for a reported void ratio; the ratio lives in `[0, 1)`.
pub const MAX_VOID_RATIO: f64 = 1.0 - EPSILON;

/// Compares two values with tolerance.
///
/// # Parameters
/// * `a` - First value
/// * `b` - Second value
/// * `eps` - Tolerance
pub fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Shorthand for `compare_with_epsilon(a, b, EPSILON)`.
#[inline]
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    compare_with_epsilon(a, b, EPSILON)
}

/// Floors `value / pitch` into a unit count, tolerant to representation error
/// (e.g. `0.3 / 0.1` must yield 3, not 2).
#[inline]
pub fn floor_count(value: f64, pitch: f64) -> u32 {
    if value.is_nan() || pitch.is_nan() || value <= 0.0 || pitch <= 0.0 {
        return 0;
    }
    let raw = (value + EPSILON) / pitch;
    if !raw.is_finite() {
        return 0;
    }
    raw.floor().min(u32::MAX as f64) as u32
}

/// Axis-aligned extent in millimetres: width (X), depth (Y), height (Z).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "w": 50.0, "d": 50.0, "h": 30.0 }))]
pub struct Dims {
    pub w: f64,
    pub d: f64,
    pub h: f64,
}

impl Dims {
    /// Creates a new extent.
    #[inline]
    pub const fn new(w: f64, d: f64, h: f64) -> Self {
        Self { w, d, h }
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.w * self.d * self.h
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dims;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}
