//! Single-SKU allocation across a box catalog.
//!
//! Splits a requested quantity into shipments. Full cartons are emitted first,
//! choosing the least wasteful carton that the remainder can still fill; the
//! tail goes into the smallest carton that holds it, or into `leftover`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::capacity::{BoxEvaluation, evaluate_catalog};
use crate::model::{
    Carton, Sku, ValidationError, validate_catalog, validate_padding, validate_proportions,
};
use crate::plan::{
    CalculationResult, ExtendedCalculationResult, ExtendedShipment, Shipment, ShipmentPlan,
};
use crate::trace::CalculationLog;
use crate::types::compare_f64;

fn default_allow_partial() -> bool {
    true
}

/// Options of the single-SKU allocator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "box_id": null, "box_padding": 0.0, "allow_partial": true }))]
pub struct AllocationOptions {
    /// Restricts the catalog to one carton.
    #[serde(default)]
    pub box_id: Option<u32>,
    /// Subtracted once from the usable width and depth of every carton.
    #[serde(default)]
    pub box_padding: f64,
    /// Emits a final, partially filled shipment instead of reporting leftover.
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self {
            box_id: None,
            box_padding: 0.0,
            allow_partial: true,
        }
    }
}

/// Catalog entries selected by an optional `box_id` filter.
///
/// An unknown id selects nothing.
pub fn candidate_boxes(boxes: &[Carton], box_id: Option<u32>) -> Vec<&Carton> {
    boxes
        .iter()
        .filter(|carton| box_id.is_none_or(|id| carton.id == id))
        .collect()
}

/// Full-shipment ranking: void ratio, then volume, then id.
fn by_void_then_volume(a: &BoxEvaluation, b: &BoxEvaluation) -> Ordering {
    compare_f64(a.void_ratio, b.void_ratio)
        .then_with(|| compare_f64(a.box_volume, b.box_volume))
        .then_with(|| a.box_id.cmp(&b.box_id))
}

/// Final-shipment ranking: volume, then void ratio, then id.
fn by_volume_then_void(a: &BoxEvaluation, b: &BoxEvaluation) -> Ordering {
    compare_f64(a.box_volume, b.box_volume)
        .then_with(|| compare_f64(a.void_ratio, b.void_ratio))
        .then_with(|| a.box_id.cmp(&b.box_id))
}

/// Shipment sequence as `(evaluation index, quantity)` pairs plus leftover.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub shipments: Vec<(usize, u32)>,
    pub leftover: u32,
}

/// Greedy allocation over precomputed evaluations.
pub(crate) fn allocate(
    evaluations: &[BoxEvaluation],
    quantity: u32,
    allow_partial: bool,
    log: &mut CalculationLog,
) -> Allocation {
    let mut allocation = Allocation::default();
    let mut remaining = quantity;

    while remaining > 0 {
        let full = evaluations
            .iter()
            .enumerate()
            .filter(|(_, e)| e.capacity > 0 && e.capacity <= remaining)
            .min_by(|(_, a), (_, b)| by_void_then_volume(a, b));

        if let Some((index, eval)) = full {
            // the chosen carton stays the best until the remainder drops below it
            let count = remaining / eval.capacity;
            crate::trace_line!(
                log,
                "{} full shipment(s) in box {} ({} units each)",
                count,
                eval.box_id,
                eval.capacity
            );
            allocation
                .shipments
                .extend(std::iter::repeat_n((index, eval.capacity), count as usize));
            remaining -= count * eval.capacity;
            continue;
        }

        let tail = evaluations
            .iter()
            .enumerate()
            .filter(|(_, e)| e.capacity > remaining)
            .min_by(|(_, a), (_, b)| by_volume_then_void(a, b));

        match tail {
            Some((index, eval)) if allow_partial => {
                crate::trace_line!(
                    log,
                    "partial shipment of {} in box {} (capacity {})",
                    remaining,
                    eval.box_id,
                    eval.capacity
                );
                allocation.shipments.push((index, remaining));
                remaining = 0;
            }
            Some((_, eval)) => {
                crate::trace_line!(
                    log,
                    "{} units left over: partial fill of box {} not allowed",
                    remaining,
                    eval.box_id
                );
                break;
            }
            None => {
                crate::trace_line!(log, "{} units left over: no box fits", remaining);
                break;
            }
        }
    }

    allocation.leftover = remaining;
    allocation
}

pub(crate) fn prepare(
    boxes: &[Carton],
    sku: &Sku,
    options: &AllocationOptions,
    log: &mut CalculationLog,
) -> Result<Vec<BoxEvaluation>, ValidationError> {
    validate_catalog(boxes)?;
    sku.validate()?;
    validate_proportions(boxes, sku)?;
    validate_padding(options.box_padding)?;

    let candidates = candidate_boxes(boxes, options.box_id);
    crate::trace_line!(
        log,
        "evaluating {} of {} boxes (padding {})",
        candidates.len(),
        boxes.len(),
        options.box_padding
    );
    Ok(evaluate_catalog(sku, &candidates, options.box_padding, log))
}

/// Splits `quantity` units of one SKU into standard shipments.
pub fn choose_boxes_for_quantity(
    boxes: &[Carton],
    sku: &Sku,
    quantity: u32,
    options: &AllocationOptions,
    log: &mut CalculationLog,
) -> Result<CalculationResult, ValidationError> {
    let evaluations = prepare(boxes, sku, options, log)?;
    let allocation = allocate(&evaluations, quantity, options.allow_partial, log);

    Ok(CalculationResult {
        shipments: allocation
            .shipments
            .iter()
            .map(|&(index, qty)| Shipment {
                plan: evaluations[index].standard.clone(),
                quantity: qty,
                sku_quantities: vec![qty],
            })
            .collect(),
        leftover: allocation.leftover,
        total_quantity: quantity,
    })
}

/// Extended counterpart of [`choose_boxes_for_quantity`].
///
/// Runs the same allocation, so boxes, capacities and void ratios match the
/// standard result shipment for shipment.
pub fn choose_boxes_for_quantity_extended(
    boxes: &[Carton],
    sku: &Sku,
    quantity: u32,
    options: &AllocationOptions,
    log: &mut CalculationLog,
) -> Result<ExtendedCalculationResult, ValidationError> {
    let evaluations = prepare(boxes, sku, options, log)?;
    let allocation = allocate(&evaluations, quantity, options.allow_partial, log);

    Ok(ExtendedCalculationResult {
        shipments: allocation
            .shipments
            .iter()
            .map(|&(index, qty)| ExtendedShipment {
                plan: evaluations[index].extended.clone(),
                quantity: qty,
                sku_quantities: vec![qty],
            })
            .collect(),
        leftover: allocation.leftover,
        total_quantity: quantity,
    })
}

/// Smallest carton that takes the whole quantity in one shipment.
///
/// Ranked by volume, then void ratio, then id. `None` when no carton is large
/// enough or the quantity is zero.
pub fn choose_single_box_for_quantity(
    boxes: &[Carton],
    sku: &Sku,
    quantity: u32,
    options: &AllocationOptions,
    log: &mut CalculationLog,
) -> Result<Option<ShipmentPlan>, ValidationError> {
    let evaluations = prepare(boxes, sku, options, log)?;
    if quantity == 0 {
        return Ok(None);
    }
    let best = evaluations
        .iter()
        .filter(|e| e.capacity >= quantity)
        .min_by(|a, b| by_volume_then_void(a, b));
    match best {
        Some(eval) => {
            crate::trace_line!(log, "single box {} holds {} units", eval.box_id, quantity);
            Ok(Some(eval.standard.clone()))
        }
        None => {
            crate::trace_line!(log, "no single box holds {} units", quantity);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    fn scenario_a() -> (Vec<Carton>, Sku) {
        (
            vec![Carton::new(1, Dims::new(300.0, 220.0, 200.0))],
            Sku::new(Dims::new(50.0, 50.0, 30.0)),
        )
    }

    fn quantities(result: &CalculationResult) -> Vec<u32> {
        result.shipments.iter().map(|s| s.quantity).collect()
    }

    #[test]
    fn scenario_a_with_partial_shipment() {
        let (boxes, sku) = scenario_a();
        let mut log = CalculationLog::disabled();
        let result =
            choose_boxes_for_quantity(&boxes, &sku, 1000, &AllocationOptions::default(), &mut log)
                .expect("valid input");

        assert_eq!(quantities(&result), vec![144, 144, 144, 144, 144, 144, 136]);
        assert_eq!(result.leftover, 0);
        assert_eq!(result.shipped() + result.leftover as u64, 1000);
    }

    #[test]
    fn scenario_a_without_partial_shipment() {
        let (boxes, sku) = scenario_a();
        let options = AllocationOptions {
            allow_partial: false,
            ..AllocationOptions::default()
        };
        let mut log = CalculationLog::disabled();
        let result = choose_boxes_for_quantity(&boxes, &sku, 1000, &options, &mut log)
            .expect("valid input");

        assert_eq!(result.shipments.len(), 6);
        assert!(
            result
                .shipments
                .iter()
                .all(|s| s.quantity == s.plan.capacity),
            "no shipment may be partially filled"
        );
        assert_eq!(result.leftover, 136);
    }

    #[test]
    fn conservation_holds_for_many_quantities() {
        let boxes = vec![
            Carton::new(1, Dims::new(300.0, 220.0, 200.0)),
            Carton::new(2, Dims::new(150.0, 110.0, 100.0)),
            Carton::new(3, Dims::new(600.0, 400.0, 400.0)),
        ];
        let sku = Sku::new(Dims::new(50.0, 40.0, 30.0));
        let mut log = CalculationLog::disabled();

        for allow_partial in [true, false] {
            let options = AllocationOptions {
                allow_partial,
                ..AllocationOptions::default()
            };
            for quantity in [0, 1, 7, 23, 144, 1000, 4321] {
                let result = choose_boxes_for_quantity(&boxes, &sku, quantity, &options, &mut log)
                    .expect("valid input");
                assert_eq!(
                    result.shipped() + result.leftover as u64,
                    quantity as u64,
                    "conservation broken for quantity {} (partial: {})",
                    quantity,
                    allow_partial
                );
                assert!(result.shipments.iter().all(|s| s.quantity <= s.plan.capacity));
            }
        }
    }

    #[test]
    fn standard_and_extended_produce_the_same_sequence() {
        let boxes = vec![
            Carton::new(4, Dims::new(300.0, 220.0, 200.0)),
            Carton::new(2, Dims::new(200.0, 200.0, 120.0)),
        ];
        let mut sku = Sku::new(Dims::new(45.0, 35.0, 28.0));
        sku.gap_xy = 2.0;
        let options = AllocationOptions {
            box_padding: 5.0,
            ..AllocationOptions::default()
        };
        let mut log = CalculationLog::disabled();
        let standard = choose_boxes_for_quantity(&boxes, &sku, 777, &options, &mut log)
            .expect("valid input");
        let extended = choose_boxes_for_quantity_extended(&boxes, &sku, 777, &options, &mut log)
            .expect("valid input");

        assert_eq!(standard.shipments.len(), extended.shipments.len());
        assert_eq!(standard.leftover, extended.leftover);
        for (s, e) in standard.shipments.iter().zip(&extended.shipments) {
            assert_eq!(s.plan.box_id, e.plan.box_id);
            assert_eq!(s.plan.capacity, e.plan.total_capacity);
            assert_eq!(s.plan.void_ratio, e.plan.void_ratio);
            assert_eq!(s.quantity, e.quantity);
        }
    }

    #[test]
    fn empty_catalog_leaves_everything_over() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let result =
            choose_boxes_for_quantity(&[], &sku, 42, &AllocationOptions::default(), &mut log)
                .expect("empty catalog is not an error");
        assert!(result.shipments.is_empty());
        assert_eq!(result.leftover, 42);
    }

    #[test]
    fn oversize_sku_leaves_everything_over() {
        let (boxes, _) = scenario_a();
        let sku = Sku::new(Dims::new(500.0, 500.0, 500.0));
        let mut log = CalculationLog::disabled();
        let result =
            choose_boxes_for_quantity(&boxes, &sku, 10, &AllocationOptions::default(), &mut log)
                .expect("oversize is not an error");
        assert!(result.shipments.is_empty());
        assert_eq!(result.leftover, 10);
    }

    #[test]
    fn box_id_restricts_the_catalog() {
        let boxes = vec![
            Carton::new(1, Dims::new(300.0, 220.0, 200.0)),
            Carton::new(2, Dims::new(100.0, 100.0, 60.0)),
        ];
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let options = AllocationOptions {
            box_id: Some(2),
            ..AllocationOptions::default()
        };
        let mut log = CalculationLog::disabled();
        let result = choose_boxes_for_quantity(&boxes, &sku, 20, &options, &mut log)
            .expect("valid input");
        assert!(result.shipments.iter().all(|s| s.plan.box_id == 2));
        assert_eq!(quantities(&result), vec![8, 8, 4]);

        let unknown = AllocationOptions {
            box_id: Some(99),
            ..AllocationOptions::default()
        };
        let result = choose_boxes_for_quantity(&boxes, &sku, 20, &unknown, &mut log)
            .expect("unknown id is not an error");
        assert_eq!(result.leftover, 20);
    }

    #[test]
    fn tail_goes_to_the_smallest_box_that_holds_it() {
        let boxes = vec![
            Carton::new(1, Dims::new(300.0, 220.0, 200.0)), // 144
            Carton::new(2, Dims::new(100.0, 100.0, 60.0)),  // 8
        ];
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let result =
            choose_boxes_for_quantity(&boxes, &sku, 5, &AllocationOptions::default(), &mut log)
                .expect("valid input");
        assert_eq!(result.shipments.len(), 1);
        assert_eq!(result.shipments[0].plan.box_id, 2);
        assert_eq!(result.shipments[0].quantity, 5);
    }

    #[test]
    fn invalid_sku_is_rejected() {
        let (boxes, _) = scenario_a();
        let sku = Sku::new(Dims::new(-1.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let result =
            choose_boxes_for_quantity(&boxes, &sku, 10, &AllocationOptions::default(), &mut log);
        assert!(matches!(result, Err(ValidationError::InvalidDimension(_))));
    }

    #[test]
    fn carton_far_larger_than_the_unit_is_rejected() {
        let boxes = vec![Carton::new(1, Dims::new(300.0, 200.0, 1e9))];
        let sku = Sku::new(Dims::new(1.0, 1.0, 1.0));
        let mut log = CalculationLog::disabled();
        let result = choose_boxes_for_quantity_extended(
            &boxes,
            &sku,
            10,
            &AllocationOptions::default(),
            &mut log,
        );
        assert!(matches!(result, Err(ValidationError::InvalidDimension(_))));
    }

    #[test]
    fn single_box_picks_the_smallest_that_holds_everything() {
        let boxes = vec![
            Carton::new(1, Dims::new(300.0, 220.0, 200.0)),
            Carton::new(2, Dims::new(100.0, 100.0, 60.0)),
        ];
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let options = AllocationOptions::default();
        let mut log = CalculationLog::disabled();

        let small = choose_single_box_for_quantity(&boxes, &sku, 8, &options, &mut log)
            .expect("valid input");
        assert_eq!(small.map(|p| p.box_id), Some(2));

        let large = choose_single_box_for_quantity(&boxes, &sku, 9, &options, &mut log)
            .expect("valid input");
        assert_eq!(large.map(|p| p.box_id), Some(1));

        let none = choose_single_box_for_quantity(&boxes, &sku, 145, &options, &mut log)
            .expect("valid input");
        assert!(none.is_none());
    }
}
