//! Footprint geometry for grid layouts.
//!
//! Computes how a SKU's bounding box can sit on the floor of a carton: the
//! usable floor after margins and padding, the allowed orientations, and the
//! grid count per axis for each in-plane rotation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{Carton, Sku};
use crate::types::{Dims, floor_count};

/// In-plane rotation of a unit's footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Deg0,
    Deg90,
}

/// Which axis of the unit points up.
///
/// `Flat` keeps the SKU's own height vertical. `Standing` puts the unit on its
/// long edge: footprint `(max(w, d), h)`, height `min(w, d)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Flat,
    Standing,
}

/// Stances to try for a SKU, most preferred first.
///
/// `prefer_vertical` is a soft bias: the standing stance comes first so it
/// wins ties, and the flat stance is always evaluated too. `keep_upright`
/// forbids standing.
pub fn preferred_stances(sku: &Sku) -> Vec<Stance> {
    if sku.prefer_vertical && !sku.keep_upright {
        vec![Stance::Standing, Stance::Flat]
    } else {
        vec![Stance::Flat]
    }
}

/// Unit extent for a stance before in-plane rotation.
pub fn stance_dims(dims: &Dims, stance: Stance) -> Dims {
    match stance {
        Stance::Flat => *dims,
        Stance::Standing => Dims::new(dims.w.max(dims.d), dims.h, dims.w.min(dims.d)),
    }
}

/// Applies an in-plane rotation to a stance extent.
pub fn rotate(dims: &Dims, rotation: Rotation) -> Dims {
    match rotation {
        Rotation::Deg0 => *dims,
        Rotation::Deg90 => Dims::new(dims.d, dims.w, dims.h),
    }
}

/// Rotations allowed for a SKU in a stance.
///
/// `Deg0` always; `Deg90` unless `keep_upright` forbids swapping length and
/// width. A square footprint gains nothing from the swap and skips it.
pub fn allowed_rotations(sku: &Sku, stanced: &Dims) -> Vec<Rotation> {
    let mut rotations = vec![Rotation::Deg0];
    if !sku.keep_upright && (stanced.w - stanced.d).abs() > f64::EPSILON {
        rotations.push(Rotation::Deg90);
    }
    rotations
}

/// Usable floor of a carton for a SKU: `(W − 2·side − padding, D − 2·front − padding)`.
///
/// Negative results are clamped to zero.
pub fn usable_footprint(sku: &Sku, carton: &Carton, box_padding: f64) -> (f64, f64) {
    let width = carton.inner.w - 2.0 * sku.side_margin - box_padding;
    let depth = carton.inner.d - 2.0 * sku.front_margin - box_padding;
    (width.max(0.0), depth.max(0.0))
}

/// Usable height of a carton for a SKU: `H − top_margin`.
pub fn usable_height(sku: &Sku, carton: &Carton) -> f64 {
    (carton.inner.h - sku.top_margin).max(0.0)
}

/// Physical length of `count` units of `len` separated by `gap`.
pub fn span(count: u32, len: f64, gap: f64) -> f64 {
    if count == 0 {
        0.0
    } else {
        count as f64 * len + (count - 1) as f64 * gap
    }
}

/// Volume one unit claims including half of every surrounding gap.
pub fn cell_volume(orientation: &Dims, gap_xy: f64, gap_z: f64) -> f64 {
    (orientation.w + gap_xy) * (orientation.d + gap_xy) * (orientation.h + gap_z)
}

/// Grid fit of one orientation on a usable floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootprintFit {
    pub stance: Stance,
    pub rotation: Rotation,
    /// Unit extent as placed: `w` along X, `d` along Y, `h` up.
    pub orientation: Dims,
    pub count_x: u32,
    pub count_y: u32,
    pub used_width: f64,
    pub used_depth: f64,
}

impl FootprintFit {
    /// Units on one full layer.
    pub fn per_layer(&self) -> u32 {
        self.count_x.saturating_mul(self.count_y)
    }
}

/// Grid count for one unit extent on a floor of `width × depth`.
pub fn grid_fit(
    width: f64,
    depth: f64,
    orientation: Dims,
    gap_xy: f64,
    stance: Stance,
    rotation: Rotation,
) -> FootprintFit {
    let count_x = floor_count(width, orientation.w + gap_xy);
    let count_y = floor_count(depth, orientation.d + gap_xy);
    // a row that cannot take a single unit contributes nothing
    let (count_x, count_y) = if count_x == 0 || count_y == 0 {
        (0, 0)
    } else {
        (count_x, count_y)
    };
    FootprintFit {
        stance,
        rotation,
        orientation,
        count_x,
        count_y,
        used_width: span(count_x, orientation.w, gap_xy),
        used_depth: span(count_y, orientation.d, gap_xy),
    }
}

/// Grid fit per allowed rotation for a SKU, carton and stance.
///
/// Never fails: a SKU larger than the usable floor yields zero counts.
pub fn footprint_fits(
    sku: &Sku,
    carton: &Carton,
    box_padding: f64,
    stance: Stance,
) -> Vec<FootprintFit> {
    let (width, depth) = usable_footprint(sku, carton, box_padding);
    let stanced = stance_dims(&sku.dims, stance);
    allowed_rotations(sku, &stanced)
        .into_iter()
        .map(|rotation| {
            grid_fit(
                width,
                depth,
                rotate(&stanced, rotation),
                sku.gap_xy,
                stance,
                rotation,
            )
        })
        .collect()
}
