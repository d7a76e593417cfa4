//! Joint packing of several SKUs.
//!
//! A carton is filled bottom-up, one layer per pass. Extended mode tiles each
//! layer into a mosaic of per-SKU blocks; standard mode gives every layer to a
//! single SKU's uniform grid. The multi-box driver repeats the fill on the
//! remaining quantities until everything is placed or no carton helps.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::allocator::candidate_boxes;
use crate::capacity::void_ratio;
use crate::geometry::{
    FootprintFit, allowed_rotations, grid_fit, preferred_stances, rotate, stance_dims,
};
use crate::layer::{
    Layer, MosaicCandidate, best_uniform_fit, consume_payload, plan_mosaic_layer, weight_limited,
};
use crate::model::{
    Carton, Sku, ValidationError, validate_catalog, validate_padding, validate_proportions,
};
use crate::plan::{
    CalculationResult, ExtendedCalculationResult, ExtendedShipment, ExtendedShipmentPlan,
    GridArrangement, MultiSkuPlan, Shipment, ShipmentPlan,
};
use crate::trace::CalculationLog;
use crate::types::{Dimensional, EPSILON, compare_f64};

/// Options of the multi-SKU packers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "box_id": null, "box_padding": 0.0 }))]
pub struct MultiSkuOptions {
    #[serde(default)]
    pub box_id: Option<u32>,
    #[serde(default)]
    pub box_padding: f64,
}

/// Clearances applied to a joint fill: the most conservative value per field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JointClearances {
    pub side_margin: f64,
    pub front_margin: f64,
    pub top_margin: f64,
    pub gap_xy: f64,
    pub gap_z: f64,
}

impl JointClearances {
    pub fn from_skus(skus: &[Sku]) -> Self {
        skus.iter().fold(Self::default(), |acc, sku| Self {
            side_margin: acc.side_margin.max(sku.side_margin),
            front_margin: acc.front_margin.max(sku.front_margin),
            top_margin: acc.top_margin.max(sku.top_margin),
            gap_xy: acc.gap_xy.max(sku.gap_xy),
            gap_z: acc.gap_z.max(sku.gap_z),
        })
    }
}

/// How each layer of a joint fill is tiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointLayering {
    /// One SKU per layer, uniform grid, lowest index first.
    SingleSku,
    /// Several SKUs per layer in left-to-right blocks.
    Mosaic,
}

/// Content of one carton after a joint fill.
#[derive(Clone, Debug, PartialEq)]
pub struct JointFill {
    pub box_id: u32,
    pub box_volume: f64,
    pub layers: Vec<Layer>,
    /// Units placed per SKU index.
    pub placed: Vec<u32>,
    pub void_ratio: f64,
    pub used_width: f64,
    pub used_depth: f64,
    pub used_height: f64,
    first_fit: Option<FootprintFit>,
}

impl JointFill {
    pub fn total(&self) -> u32 {
        self.placed.iter().fold(0u32, |acc, n| acc.saturating_add(*n))
    }

    /// True when the fill placed every unit of `wanted`.
    pub fn holds(&self, wanted: &[u32]) -> bool {
        self.placed.iter().zip(wanted).all(|(p, w)| p >= w)
    }

    pub fn to_extended(&self) -> ExtendedShipmentPlan {
        ExtendedShipmentPlan {
            box_id: self.box_id,
            total_capacity: self.total(),
            void_ratio: self.void_ratio,
            layers: self.layers.clone(),
            sku_capacities: self.placed.clone(),
            used_width: self.used_width,
            used_depth: self.used_depth,
            used_height: self.used_height,
        }
    }

    pub fn to_standard(&self) -> ShipmentPlan {
        ShipmentPlan {
            box_id: self.box_id,
            capacity: self.total(),
            void_ratio: self.void_ratio,
            layers: self.layers.len() as u32,
            grid: self.first_fit.as_ref().map(GridArrangement::from),
        }
    }
}

/// Best grid of `sku` on the joint floor that still fits under `height_left`.
///
/// Stances are tried in preference order, so a standing SKU falls back to
/// flat when the remaining height is too low.
fn joint_fit(
    sku: &Sku,
    width: f64,
    depth: f64,
    height_left: f64,
    clearances: &JointClearances,
) -> Option<FootprintFit> {
    preferred_stances(sku).into_iter().find_map(|stance| {
        let stanced = stance_dims(&sku.dims, stance);
        let fits: Vec<FootprintFit> = allowed_rotations(sku, &stanced)
            .into_iter()
            .map(|rotation| {
                grid_fit(
                    width,
                    depth,
                    rotate(&stanced, rotation),
                    clearances.gap_xy,
                    stance,
                    rotation,
                )
            })
            .collect();
        best_uniform_fit(&fits)
            .filter(|fit| fit.orientation.h + clearances.gap_z <= height_left + EPSILON)
    })
}

/// Fills one carton with the `remaining` units of `skus`.
///
/// Returns `None` when not a single unit fits.
pub fn fill_box(
    carton: &Carton,
    skus: &[Sku],
    remaining: &[u32],
    box_padding: f64,
    layering: JointLayering,
    log: &mut CalculationLog,
) -> Option<JointFill> {
    let clearances = JointClearances::from_skus(skus);
    let width = (carton.inner.w - 2.0 * clearances.side_margin - box_padding).max(0.0);
    let depth = (carton.inner.d - 2.0 * clearances.front_margin - box_padding).max(0.0);
    let mut height_left = (carton.inner.h - clearances.top_margin).max(0.0);
    let mut payload = carton.payload_capacity_kg();

    let mut left = remaining.to_vec();
    let mut layers_used = vec![0u32; skus.len()];
    let mut blocked = vec![false; skus.len()];
    let mut layers: Vec<Layer> = Vec::new();
    let mut first_fit = None;

    loop {
        let active: Vec<(usize, FootprintFit)> = skus
            .iter()
            .enumerate()
            .filter(|(i, sku)| {
                left[*i] > 0
                    && !blocked[*i]
                    && sku.max_stack_layers.is_none_or(|max| layers_used[*i] < max)
            })
            .filter_map(|(i, sku)| {
                joint_fit(sku, width, depth, height_left, &clearances).map(|fit| (i, fit))
            })
            .collect();
        if active.is_empty() {
            break;
        }

        let layer = match layering {
            JointLayering::SingleSku => {
                let (index, fit) = active[0];
                let units = weight_limited(
                    left[index].min(fit.per_layer()),
                    skus[index].effective_unit_weight(),
                    payload,
                );
                if units == 0 {
                    blocked[index] = true;
                    continue;
                }
                consume_payload(&mut payload, units, skus[index].effective_unit_weight());
                first_fit.get_or_insert(fit);
                left[index] -= units;
                layers_used[index] += 1;
                Layer::uniform(index, &fit, units)
            }
            JointLayering::Mosaic => {
                let layer_height = active
                    .iter()
                    .map(|(_, fit)| fit.orientation.h)
                    .fold(f64::INFINITY, f64::min);
                let candidates: Vec<MosaicCandidate> = active
                    .iter()
                    .filter(|(_, fit)| fit.orientation.h <= layer_height + EPSILON)
                    .map(|&(index, fit)| MosaicCandidate {
                        sku_index: index,
                        fit,
                        wanted: left[index],
                        unit_weight_kg: skus[index].effective_unit_weight(),
                    })
                    .collect();
                let Some(mut layer) =
                    plan_mosaic_layer(width, clearances.gap_xy, &candidates, &mut payload)
                else {
                    candidates.iter().for_each(|c| blocked[c.sku_index] = true);
                    continue;
                };
                layer.height = layer_height;
                for cand in &candidates {
                    let units = layer.units_for(cand.sku_index);
                    if units > 0 {
                        left[cand.sku_index] -= units;
                        layers_used[cand.sku_index] += 1;
                    }
                }
                layer
            }
        };

        height_left -= layer.height + clearances.gap_z;
        layers.push(layer);
    }

    let placed: Vec<u32> = remaining.iter().zip(&left).map(|(r, l)| r - l).collect();
    if placed.iter().all(|p| *p == 0) {
        crate::trace_line!(log, "box {}: nothing fits jointly", carton.id);
        return None;
    }

    let used_volume: f64 = layers
        .iter()
        .map(|layer| layer.claimed_volume(clearances.gap_xy, clearances.gap_z))
        .sum();
    let box_volume = carton.volume();
    let ratio = void_ratio(used_volume, box_volume);

    let (used_width, used_depth) = layers
        .iter()
        .map(|layer| layer.used_extent(clearances.gap_xy))
        .fold((0.0_f64, 0.0_f64), |(w, d), (lw, ld)| (w.max(lw), d.max(ld)));
    let used_height = layers.iter().map(|layer| layer.height).sum::<f64>()
        + layers.len().saturating_sub(1) as f64 * clearances.gap_z;

    crate::trace_line!(
        log,
        "box {}: {:?} fill places {:?} in {} layers, void {:.4}",
        carton.id,
        layering,
        placed,
        layers.len(),
        ratio
    );

    Some(JointFill {
        box_id: carton.id,
        box_volume,
        layers,
        placed,
        void_ratio: ratio,
        used_width,
        used_depth,
        used_height,
        first_fit,
    })
}

fn validate_multi(
    boxes: &[Carton],
    skus: &[Sku],
    quantities: &[u32],
    box_padding: f64,
) -> Result<(), ValidationError> {
    if skus.len() != quantities.len() {
        return Err(ValidationError::InvalidQuantity(format!(
            "expected {} quantities for {} SKUs, got {}",
            skus.len(),
            skus.len(),
            quantities.len()
        )));
    }
    let total = quantities.iter().map(|q| u64::from(*q)).sum::<u64>();
    if total > u64::from(u32::MAX) {
        return Err(ValidationError::InvalidQuantity(format!(
            "combined quantity {} exceeds {}",
            total,
            u32::MAX
        )));
    }
    validate_catalog(boxes)?;
    skus.iter().try_for_each(Sku::validate)?;
    skus.iter().try_for_each(|sku| validate_proportions(boxes, sku))?;
    validate_padding(box_padding)
}

/// Smallest first: volume, void ratio, id.
fn by_volume_then_void(a: &JointFill, b: &JointFill) -> Ordering {
    compare_f64(a.box_volume, b.box_volume)
        .then_with(|| compare_f64(a.void_ratio, b.void_ratio))
        .then_with(|| a.box_id.cmp(&b.box_id))
}

/// Most units first, then void ratio, volume and id.
fn by_progress(a: &JointFill, b: &JointFill) -> Ordering {
    b.total()
        .cmp(&a.total())
        .then_with(|| compare_f64(a.void_ratio, b.void_ratio))
        .then_with(|| compare_f64(a.box_volume, b.box_volume))
        .then_with(|| a.box_id.cmp(&b.box_id))
}

/// One carton instance holding every requested unit of every SKU.
///
/// Uses mosaic layers. Returns the smallest carton that holds everything, or
/// `None` when no single carton does.
pub fn choose_box_multi_sku_extended(
    boxes: &[Carton],
    skus: &[Sku],
    quantities: &[u32],
    box_id: Option<u32>,
    box_padding: f64,
    log: &mut CalculationLog,
) -> Result<Option<MultiSkuPlan>, ValidationError> {
    validate_multi(boxes, skus, quantities, box_padding)?;
    if quantities.iter().all(|q| *q == 0) {
        return Ok(None);
    }

    let best = candidate_boxes(boxes, box_id)
        .into_iter()
        .filter_map(|carton| {
            fill_box(carton, skus, quantities, box_padding, JointLayering::Mosaic, log)
        })
        .filter(|fill| fill.holds(quantities))
        .min_by(by_volume_then_void);

    match &best {
        Some(fill) => crate::trace_line!(log, "single box {} holds all units", fill.box_id),
        None => crate::trace_line!(log, "no single box holds all units"),
    }
    Ok(best.map(|fill| fill.to_extended()))
}

/// Joint fills over as many cartons as needed.
fn drive(
    boxes: &[Carton],
    skus: &[Sku],
    quantities: &[u32],
    options: &MultiSkuOptions,
    layering: JointLayering,
    log: &mut CalculationLog,
) -> (Vec<JointFill>, u32) {
    let candidates = candidate_boxes(boxes, options.box_id);
    let mut remaining = quantities.to_vec();
    let mut fills = Vec::new();

    while remaining.iter().any(|q| *q > 0) {
        let options_for_round: Vec<JointFill> = candidates
            .iter()
            .filter_map(|carton| {
                fill_box(carton, skus, &remaining, options.box_padding, layering, log)
            })
            .collect();

        let complete = options_for_round
            .iter()
            .filter(|fill| fill.holds(&remaining))
            .min_by(|a, b| by_volume_then_void(a, b));
        let chosen = complete.or_else(|| options_for_round.iter().min_by(|a, b| by_progress(a, b)));

        let Some(fill) = chosen.filter(|fill| fill.total() > 0) else {
            crate::trace_line!(log, "no box makes progress on {:?}", remaining);
            break;
        };
        crate::trace_line!(log, "shipment in box {}: {:?}", fill.box_id, fill.placed);
        for (left, placed) in remaining.iter_mut().zip(&fill.placed) {
            *left -= placed;
        }
        fills.push(fill.clone());
    }

    let leftover: u32 = remaining.iter().sum();
    (fills, leftover)
}

/// Combined quantity; `validate_multi` guarantees it fits in `u32`.
fn total_of(quantities: &[u32]) -> u32 {
    quantities.iter().sum()
}

/// Packs several SKUs into standard shipments, one SKU per layer.
pub fn choose_boxes_for_multi_sku(
    boxes: &[Carton],
    skus: &[Sku],
    quantities: &[u32],
    options: &MultiSkuOptions,
    log: &mut CalculationLog,
) -> Result<CalculationResult, ValidationError> {
    validate_multi(boxes, skus, quantities, options.box_padding)?;
    let (fills, leftover) = drive(
        boxes,
        skus,
        quantities,
        options,
        JointLayering::SingleSku,
        log,
    );
    Ok(CalculationResult {
        shipments: fills
            .iter()
            .map(|fill| Shipment {
                plan: fill.to_standard(),
                quantity: fill.total(),
                sku_quantities: fill.placed.clone(),
            })
            .collect(),
        leftover,
        total_quantity: total_of(quantities),
    })
}

/// Packs several SKUs into extended shipments with mosaic layers.
pub fn choose_boxes_for_multi_sku_extended(
    boxes: &[Carton],
    skus: &[Sku],
    quantities: &[u32],
    options: &MultiSkuOptions,
    log: &mut CalculationLog,
) -> Result<ExtendedCalculationResult, ValidationError> {
    validate_multi(boxes, skus, quantities, options.box_padding)?;
    let (fills, leftover) = drive(boxes, skus, quantities, options, JointLayering::Mosaic, log);
    Ok(ExtendedCalculationResult {
        shipments: fills
            .iter()
            .map(|fill| ExtendedShipment {
                plan: fill.to_extended(),
                quantity: fill.total(),
                sku_quantities: fill.placed.clone(),
            })
            .collect(),
        leftover,
        total_quantity: total_of(quantities),
    })
}
