//! Layer planning.
//!
//! A layer is one horizontal slice of units inside a carton. This module picks
//! the grid for a single SKU (uniform or a two-block mixed-orientation layout)
//! and tiles multi-SKU layers into left-to-right blocks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geometry::{FootprintFit, Rotation, cell_volume, grid_fit, span};
use crate::types::{Dims, floor_count};

/// Tiling strategy used for a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    UniformGrid,
    MixedOrientation,
    MultiSkuMosaic,
}

/// Arrangement of units across a layer, detailed enough to redraw it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerColumns {
    /// One grid of identically oriented units anchored at the origin.
    UniformGrid {
        sku_index: usize,
        count_x: u32,
        count_y: u32,
        rotation: Rotation,
        orientation: Dims,
    },
    /// Blocks laid left to right along X, each spanning the depth from y = 0.
    MixedBlocks { blocks: Vec<LayerBlock> },
}

/// A rectangular block of one SKU inside a mixed layer.
///
/// Units fill the block column by column; the last column may be partial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LayerBlock {
    pub sku_index: usize,
    pub count_x: u32,
    pub count_y: u32,
    pub rotation: Rotation,
    pub orientation: Dims,
    pub units: u32,
    pub offset_x: f64,
}

impl LayerBlock {
    fn width(&self, gap_xy: f64) -> f64 {
        span(self.count_x, self.orientation.w, gap_xy)
    }
}

/// One horizontal slice of packed units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Layer {
    pub layout_type: LayoutType,
    pub columns: LayerColumns,
    pub per_layer_capacity: u32,
    /// Height of the tallest unit in the layer, gaps excluded.
    pub height: f64,
}

impl Layer {
    /// Uniform grid layer of one SKU holding `units` (at most the grid size).
    pub fn uniform(sku_index: usize, fit: &FootprintFit, units: u32) -> Self {
        Self {
            layout_type: LayoutType::UniformGrid,
            columns: LayerColumns::UniformGrid {
                sku_index,
                count_x: fit.count_x,
                count_y: fit.count_y,
                rotation: fit.rotation,
                orientation: fit.orientation,
            },
            per_layer_capacity: units.min(fit.per_layer()),
            height: fit.orientation.h,
        }
    }

    /// Units of `sku_index` in this layer.
    pub fn units_for(&self, sku_index: usize) -> u32 {
        match &self.columns {
            LayerColumns::UniformGrid { sku_index: own, .. } => {
                if *own == sku_index {
                    self.per_layer_capacity
                } else {
                    0
                }
            }
            LayerColumns::MixedBlocks { blocks } => blocks
                .iter()
                .filter(|b| b.sku_index == sku_index)
                .map(|b| b.units)
                .sum(),
        }
    }

    /// Occupied width and depth of the layer.
    pub fn used_extent(&self, gap_xy: f64) -> (f64, f64) {
        match &self.columns {
            LayerColumns::UniformGrid {
                count_x,
                count_y,
                orientation,
                ..
            } => (
                span(*count_x, orientation.w, gap_xy),
                span(*count_y, orientation.d, gap_xy),
            ),
            LayerColumns::MixedBlocks { blocks } => {
                let width = blocks
                    .iter()
                    .map(|b| b.offset_x + b.width(gap_xy))
                    .fold(0.0, f64::max);
                let depth = blocks
                    .iter()
                    .map(|b| span(b.count_y, b.orientation.d, gap_xy))
                    .fold(0.0, f64::max);
                (width, depth)
            }
        }
    }

    /// Volume claimed by the layer's units, half gaps included.
    pub fn claimed_volume(&self, gap_xy: f64, gap_z: f64) -> f64 {
        match &self.columns {
            LayerColumns::UniformGrid { orientation, .. } => {
                self.per_layer_capacity as f64 * cell_volume(orientation, gap_xy, gap_z)
            }
            LayerColumns::MixedBlocks { blocks } => blocks
                .iter()
                .map(|b| b.units as f64 * cell_volume(&b.orientation, gap_xy, gap_z))
                .sum(),
        }
    }
}

/// Picks the rotation with the most units per layer.
///
/// Ties keep the earlier entry, which is always `Deg0`. Both orientation hints
/// are settled before this point: `keep_upright` leaves `Deg0` as the only
/// rotation, and `prefer_vertical` picks the stance the fits were built from.
/// Within either stance `Deg0` keeps the unit's width along X as the caller
/// described it, so a tie never turns the unit against its hints.
/// `None` when nothing fits.
pub fn best_uniform_fit(fits: &[FootprintFit]) -> Option<FootprintFit> {
    let mut best: Option<FootprintFit> = None;
    for fit in fits.iter().filter(|f| f.per_layer() > 0) {
        match best {
            Some(current) if fit.per_layer() <= current.per_layer() => {}
            _ => best = Some(*fit),
        }
    }
    best
}

/// Layer chosen for a single SKU.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerPlan {
    pub layer: Layer,
    /// Grid of the dominant block, reported by the standard plan.
    pub primary: FootprintFit,
}

impl LayerPlan {
    pub fn per_layer(&self) -> u32 {
        self.layer.per_layer_capacity
    }
}

/// Plans a full layer for one SKU on a `width × depth` floor.
///
/// Starts from the best uniform grid. When both rotations are allowed, also
/// tries `k` columns in one rotation followed by the remaining width in the
/// other; such a layout replaces the uniform grid only when strictly better.
pub fn plan_single_sku_layer(
    fits: &[FootprintFit],
    width: f64,
    depth: f64,
    gap_xy: f64,
) -> Option<LayerPlan> {
    let uniform = best_uniform_fit(fits)?;
    let mut best = LayerPlan {
        layer: Layer::uniform(0, &uniform, uniform.per_layer()),
        primary: uniform,
    };

    if fits.len() < 2 {
        return Some(best);
    }

    for primary in fits.iter().filter(|f| f.per_layer() > 0) {
        let Some(secondary) = fits.iter().find(|f| f.rotation != primary.rotation) else {
            continue;
        };
        let pitch = primary.orientation.w + gap_xy;
        for k in 1..primary.count_x {
            let rest_width = width - k as f64 * pitch;
            let rest = grid_fit(
                rest_width,
                depth,
                secondary.orientation,
                gap_xy,
                secondary.stance,
                secondary.rotation,
            );
            if rest.per_layer() == 0 {
                continue;
            }
            let total = k * primary.count_y + rest.per_layer();
            if total <= best.per_layer() {
                continue;
            }
            let blocks = vec![
                LayerBlock {
                    sku_index: 0,
                    count_x: k,
                    count_y: primary.count_y,
                    rotation: primary.rotation,
                    orientation: primary.orientation,
                    units: k * primary.count_y,
                    offset_x: 0.0,
                },
                LayerBlock {
                    sku_index: 0,
                    count_x: rest.count_x,
                    count_y: rest.count_y,
                    rotation: rest.rotation,
                    orientation: rest.orientation,
                    units: rest.per_layer(),
                    offset_x: k as f64 * pitch,
                },
            ];
            best = LayerPlan {
                layer: Layer {
                    layout_type: LayoutType::MixedOrientation,
                    columns: LayerColumns::MixedBlocks { blocks },
                    per_layer_capacity: total,
                    height: primary.orientation.h.max(rest.orientation.h),
                },
                primary: *primary,
            };
        }
    }

    Some(best)
}

/// One SKU taking part in a multi-SKU layer.
#[derive(Clone, Copy, Debug)]
pub struct MosaicCandidate {
    pub sku_index: usize,
    /// Grid of the SKU on the full joint floor; `count_y` units per column.
    pub fit: FootprintFit,
    /// Units this SKU may still place in the layer.
    pub wanted: u32,
    pub unit_weight_kg: Option<f64>,
}

pub(crate) fn weight_limited(
    units: u32,
    unit_weight_kg: Option<f64>,
    payload_kg: Option<f64>,
) -> u32 {
    match (unit_weight_kg, payload_kg) {
        (Some(unit), Some(payload)) if unit > 0.0 => units.min(floor_count(payload, unit)),
        _ => units,
    }
}

pub(crate) fn consume_payload(
    payload_kg: &mut Option<f64>,
    units: u32,
    unit_weight_kg: Option<f64>,
) {
    if let (Some(payload), Some(unit)) = (payload_kg.as_mut(), unit_weight_kg) {
        *payload = (*payload - units as f64 * unit).max(0.0);
    }
}

/// Tiles a layer into one block per SKU, left to right along X.
///
/// Each block's width is proportional to the SKU's share of the wanted units.
/// A second sweep hands leftover width to SKUs that still have units, in
/// candidate order. `payload_kg` is the carton's remaining payload and is
/// reduced by the units placed. Returns `None` when no unit fits.
pub fn plan_mosaic_layer(
    width: f64,
    gap_xy: f64,
    candidates: &[MosaicCandidate],
    payload_kg: &mut Option<f64>,
) -> Option<Layer> {
    let total_wanted: u64 = candidates.iter().map(|c| c.wanted as u64).sum();
    if total_wanted == 0 {
        return None;
    }
    let last_active = candidates.iter().rposition(|c| c.wanted > 0);

    let mut blocks: Vec<LayerBlock> = Vec::new();
    let mut placed = vec![0u32; candidates.len()];
    let mut cursor = 0.0;

    let push_block =
        |blocks: &mut Vec<LayerBlock>, cand: &MosaicCandidate, cols: u32, units: u32, at: f64| {
            blocks.push(LayerBlock {
                sku_index: cand.sku_index,
                count_x: cols,
                count_y: cand.fit.count_y,
                rotation: cand.fit.rotation,
                orientation: cand.fit.orientation,
                units,
                offset_x: at,
            });
        };

    for (pos, cand) in candidates.iter().enumerate() {
        if cand.wanted == 0 || cand.fit.count_y == 0 {
            continue;
        }
        let pitch = cand.fit.orientation.w + gap_xy;
        let free = width - cursor;
        let max_cols = floor_count(free, pitch);
        if max_cols == 0 {
            continue;
        }
        let rows = cand.fit.count_y;
        let cols_needed = cand.wanted.div_ceil(rows);
        let share = if Some(pos) == last_active {
            free
        } else {
            // keep one column free for every later SKU that has units
            let reserved: f64 = candidates[pos + 1..]
                .iter()
                .filter(|c| c.wanted > 0 && c.fit.count_y > 0)
                .map(|c| c.fit.orientation.w + gap_xy)
                .sum();
            (width * cand.wanted as f64 / total_wanted as f64).min(free - reserved)
        };
        let cols = floor_count(share, pitch).max(1).min(max_cols).min(cols_needed);
        let units = weight_limited(
            cand.wanted.min(cols * rows),
            cand.unit_weight_kg,
            *payload_kg,
        );
        if units == 0 {
            continue;
        }
        let cols = units.div_ceil(rows);
        consume_payload(payload_kg, units, cand.unit_weight_kg);
        push_block(&mut blocks, cand, cols, units, cursor);
        placed[pos] += units;
        cursor += cols as f64 * pitch;
    }

    for (pos, cand) in candidates.iter().enumerate() {
        let left = cand.wanted.saturating_sub(placed[pos]);
        if left == 0 || cand.fit.count_y == 0 {
            continue;
        }
        let pitch = cand.fit.orientation.w + gap_xy;
        let max_cols = floor_count(width - cursor, pitch);
        if max_cols == 0 {
            continue;
        }
        let rows = cand.fit.count_y;
        let cols = max_cols.min(left.div_ceil(rows));
        let units = weight_limited(left.min(cols * rows), cand.unit_weight_kg, *payload_kg);
        if units == 0 {
            continue;
        }
        let cols = units.div_ceil(rows);
        consume_payload(payload_kg, units, cand.unit_weight_kg);
        push_block(&mut blocks, cand, cols, units, cursor);
        placed[pos] += units;
        cursor += cols as f64 * pitch;
    }

    if blocks.is_empty() {
        return None;
    }

    let height = blocks
        .iter()
        .map(|b| b.orientation.h)
        .fold(0.0, f64::max);
    Some(Layer {
        layout_type: LayoutType::MultiSkuMosaic,
        per_layer_capacity: blocks.iter().map(|b| b.units).sum(),
        columns: LayerColumns::MixedBlocks { blocks },
        height,
    })
}
