//! Quantity plan: which single carton carries `q` units, for q = 1..=max.
//!
//! Consecutive quantities with the same plan are merged into one group, so a
//! packing desk can read off which carton to grab for a given order size.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::allocator::{AllocationOptions, allocate, prepare};
use crate::model::{Carton, Sku, ValidationError};
use crate::plan::{ExtendedShipmentPlan, ShipmentPlan};
use crate::trace::CalculationLog;

/// Upper bound for the plan's quantity range.
pub const MAX_ALLOWED_QUANTITY: u32 = 500;

/// A run of quantities sharing the same single-carton plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuantityGroup {
    pub start: u32,
    pub end: u32,
    /// `None` when the quantities need more than one carton.
    pub plan: Option<ShipmentPlan>,
    pub extended_plan: Option<ExtendedShipmentPlan>,
}

/// Groups single-carton plans for every quantity from 1 to `max_quantity`.
///
/// `max_quantity` is clamped to `1..=MAX_ALLOWED_QUANTITY`. A quantity gets a
/// plan only when the allocator ships it in exactly one carton with nothing
/// left over. Groups are contiguous and cover the whole range.
pub fn build_quantity_plan(
    boxes: &[Carton],
    sku: &Sku,
    max_quantity: u32,
    options: &AllocationOptions,
    log: &mut CalculationLog,
) -> Result<Vec<QuantityGroup>, ValidationError> {
    let limit = max_quantity.clamp(1, MAX_ALLOWED_QUANTITY);
    let evaluations = prepare(boxes, sku, options, log)?;
    // per-quantity allocation is not traced
    let mut quiet = CalculationLog::disabled();

    let mut groups: Vec<QuantityGroup> = Vec::new();
    for quantity in 1..=limit {
        let allocation = allocate(&evaluations, quantity, options.allow_partial, &mut quiet);
        let index = match allocation.shipments.as_slice() {
            [(index, _)] if allocation.leftover == 0 => Some(*index),
            _ => None,
        };
        let plan = index.map(|i| evaluations[i].standard.clone());

        match groups.last_mut() {
            Some(current) if current.plan == plan => current.end = quantity,
            _ => groups.push(QuantityGroup {
                start: quantity,
                end: quantity,
                plan,
                extended_plan: index.map(|i| evaluations[i].extended.clone()),
            }),
        }
    }

    crate::trace_line!(
        log,
        "quantity plan 1..={} has {} groups",
        limit,
        groups.len()
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    fn catalog() -> Vec<Carton> {
        vec![
            Carton::new(1, Dims::new(300.0, 200.0, 180.0)), // 144 units, no void
            Carton::new(2, Dims::new(110.0, 100.0, 60.0)),  // 8 units
        ]
    }

    #[test]
    fn groups_are_contiguous_and_merge_identical_plans() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let groups = build_quantity_plan(
            &catalog(),
            &sku,
            200,
            &AllocationOptions::default(),
            &mut log,
        )
        .expect("valid input");

        assert_eq!(groups[0].start, 1);
        assert_eq!(groups.last().map(|g| g.end), Some(200));
        for pair in groups.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start, "groups must not leave gaps");
            assert_ne!(pair[0].plan, pair[1].plan, "neighbours must differ");
        }

        // 1..=8 fit the small box; 9 already needs two of them
        assert_eq!((groups[0].start, groups[0].end), (1, 8));
        assert_eq!(groups[0].plan.as_ref().map(|p| p.box_id), Some(2));
        assert!(groups[1].plan.is_none());

        let exact = groups
            .iter()
            .find(|g| g.plan.as_ref().map(|p| p.box_id) == Some(1))
            .expect("the large box appears for a full load");
        assert_eq!((exact.start, exact.end), (144, 144));
    }

    #[test]
    fn quantities_beyond_the_largest_box_have_no_plan() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let groups = build_quantity_plan(
            &catalog(),
            &sku,
            150,
            &AllocationOptions::default(),
            &mut log,
        )
        .expect("valid input");

        let last = groups.last().expect("at least one group");
        assert_eq!((last.start, last.end), (145, 150));
        assert!(last.plan.is_none());
        assert!(last.extended_plan.is_none());
    }

    #[test]
    fn limit_is_clamped() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let options = AllocationOptions::default();

        let groups = build_quantity_plan(&catalog(), &sku, 10_000, &options, &mut log)
            .expect("valid input");
        assert_eq!(groups.last().map(|g| g.end), Some(MAX_ALLOWED_QUANTITY));

        let groups = build_quantity_plan(&catalog(), &sku, 0, &options, &mut log)
            .expect("valid input");
        assert_eq!(groups.len(), 1);
        assert_eq!((groups[0].start, groups[0].end), (1, 1));
    }
}
