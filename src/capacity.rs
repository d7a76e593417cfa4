//! Box capacity evaluation for a single SKU.
//!
//! Combines the layer planner and the stack planner into a per-carton
//! capacity and void ratio. The standard and extended plans are built from
//! the same evaluation.

use crate::geometry::{
    Stance, cell_volume, footprint_fits, preferred_stances, span, usable_footprint,
    usable_height,
};
use crate::layer::{LayerPlan, plan_single_sku_layer};
use crate::model::{Carton, Sku};
use crate::plan::{ExtendedShipmentPlan, GridArrangement, ShipmentPlan};
use crate::stack::{StackInput, StackPlan, plan_stack};
use crate::trace::CalculationLog;
use crate::types::{Dimensional, MAX_VOID_RATIO};

/// Fraction of the carton not claimed by packed units.
///
/// Every unit owns half of each adjacent gap, so it claims
/// `(a + gap_xy)(b + gap_xy)(c + gap_z)`. Clamped to `[0, MAX_VOID_RATIO]`;
/// an empty carton reports `MAX_VOID_RATIO`.
pub fn void_ratio(used_volume: f64, carton_volume: f64) -> f64 {
    if carton_volume <= 0.0 || used_volume <= 0.0 {
        return MAX_VOID_RATIO;
    }
    (1.0 - used_volume / carton_volume).clamp(0.0, MAX_VOID_RATIO)
}

/// Capacity of one carton for one SKU.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxEvaluation {
    pub box_id: u32,
    pub box_volume: f64,
    pub capacity: u32,
    pub void_ratio: f64,
    pub stance: Option<Stance>,
    pub stack: Option<StackPlan>,
    pub standard: ShipmentPlan,
    pub extended: ExtendedShipmentPlan,
}

impl BoxEvaluation {
    fn empty(carton: &Carton) -> Self {
        Self {
            box_id: carton.id,
            box_volume: carton.volume(),
            capacity: 0,
            void_ratio: MAX_VOID_RATIO,
            stance: None,
            stack: None,
            standard: ShipmentPlan {
                box_id: carton.id,
                capacity: 0,
                void_ratio: MAX_VOID_RATIO,
                layers: 0,
                grid: None,
            },
            extended: ExtendedShipmentPlan {
                box_id: carton.id,
                total_capacity: 0,
                void_ratio: MAX_VOID_RATIO,
                layers: Vec::new(),
                sku_capacities: vec![0],
                used_width: 0.0,
                used_depth: 0.0,
                used_height: 0.0,
            },
        }
    }

    pub fn fits_anything(&self) -> bool {
        self.capacity > 0
    }
}

/// Layer plan and stack for one stance, if the stance holds at least one layer.
fn evaluate_stance(
    sku: &Sku,
    carton: &Carton,
    box_padding: f64,
    stance: Stance,
) -> Option<(LayerPlan, StackPlan)> {
    let fits = footprint_fits(sku, carton, box_padding, stance);
    let (width, depth) = usable_footprint(sku, carton, box_padding);
    let layer_plan = plan_single_sku_layer(&fits, width, depth, sku.gap_xy)?;
    let stack = plan_stack(&StackInput {
        unit_height: layer_plan.layer.height,
        gap_z: sku.gap_z,
        usable_height: usable_height(sku, carton),
        max_stack_layers: sku.max_stack_layers,
        per_layer_capacity: layer_plan.per_layer(),
        unit_weight_kg: sku.effective_unit_weight(),
        payload_kg: carton.payload_capacity_kg(),
    });
    if stack.layers == 0 {
        return None;
    }
    Some((layer_plan, stack))
}

/// Evaluates how many units of `sku` one instance of `carton` holds.
///
/// Every allowed stance is evaluated and the one with the most units wins.
/// On equal capacity the earlier stance in preference order is kept, so
/// `prefer_vertical` only decides ties. Never fails: a SKU that fits nowhere
/// yields capacity 0.
pub fn evaluate_box(
    sku: &Sku,
    carton: &Carton,
    box_padding: f64,
    log: &mut CalculationLog,
) -> BoxEvaluation {
    let mut chosen: Option<(Stance, LayerPlan, StackPlan)> = None;
    for stance in preferred_stances(sku) {
        let Some((layer_plan, stack)) = evaluate_stance(sku, carton, box_padding, stance) else {
            continue;
        };
        let capacity = layer_plan.per_layer().saturating_mul(stack.layers);
        let better = chosen.as_ref().is_none_or(|(_, current, current_stack)| {
            capacity > current.per_layer().saturating_mul(current_stack.layers)
        });
        if better {
            chosen = Some((stance, layer_plan, stack));
        }
    }
    let Some((stance, layer_plan, stack)) = chosen else {
        crate::trace_line!(log, "box {}: sku does not fit", carton.id);
        return BoxEvaluation::empty(carton);
    };

    let per_layer = layer_plan.per_layer();
    let capacity = per_layer.saturating_mul(stack.layers);
    let orientation = layer_plan.primary.orientation;
    let box_volume = carton.volume();
    let ratio = void_ratio(
        capacity as f64 * cell_volume(&orientation, sku.gap_xy, sku.gap_z),
        box_volume,
    );

    crate::trace_line!(
        log,
        "box {}: {:?} {:?} {} per layer x {} layers ({:?}) = {} units, void {:.4}",
        carton.id,
        stance,
        layer_plan.layer.layout_type,
        per_layer,
        stack.layers,
        stack.limited_by,
        capacity,
        ratio
    );

    let (used_width, used_depth) = layer_plan.layer.used_extent(sku.gap_xy);
    let used_height = span(stack.layers, layer_plan.layer.height, sku.gap_z);
    let grid = GridArrangement::from(&layer_plan.primary);
    let layers = vec![layer_plan.layer; stack.layers as usize];

    BoxEvaluation {
        box_id: carton.id,
        box_volume,
        capacity,
        void_ratio: ratio,
        stance: Some(stance),
        stack: Some(stack),
        standard: ShipmentPlan {
            box_id: carton.id,
            capacity,
            void_ratio: ratio,
            layers: stack.layers,
            grid: Some(grid),
        },
        extended: ExtendedShipmentPlan {
            box_id: carton.id,
            total_capacity: capacity,
            void_ratio: ratio,
            layers,
            sku_capacities: vec![capacity],
            used_width,
            used_depth,
            used_height,
        },
    }
}

/// Evaluates every carton in catalog order.
pub fn evaluate_catalog(
    sku: &Sku,
    boxes: &[&Carton],
    box_padding: f64,
    log: &mut CalculationLog,
) -> Vec<BoxEvaluation> {
    boxes
        .iter()
        .map(|carton| evaluate_box(sku, carton, box_padding, log))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayoutType;
    use crate::stack::StackLimit;
    use crate::types::{Dims, EPSILON};

    fn scenario_a_box() -> Carton {
        Carton::new(1, Dims::new(300.0, 220.0, 200.0))
    }

    #[test]
    fn scenario_a_capacity_is_144() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &scenario_a_box(), 0.0, &mut log);

        assert_eq!(eval.capacity, 144);
        assert_eq!(eval.standard.layers, 6);
        let grid = eval.standard.grid.as_ref().expect("grid should be set");
        assert_eq!((grid.count_x, grid.count_y), (6, 4));

        // 144 * 75_000 / 13_200_000
        let expected = 1.0 - 144.0 * 75_000.0 / 13_200_000.0;
        assert!((eval.void_ratio - expected).abs() < EPSILON);
    }

    #[test]
    fn scenario_c_max_stack_layers_caps_capacity() {
        let mut sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        sku.max_stack_layers = Some(2);
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &scenario_a_box(), 0.0, &mut log);

        assert_eq!(eval.standard.layers, 2, "layer count must be exactly 2, never 6");
        assert_eq!(eval.capacity, 48);
        assert_eq!(eval.extended.layers.len(), 2);
        assert_eq!(
            eval.stack.map(|s| s.limited_by),
            Some(StackLimit::MaxStackLayers)
        );
    }

    #[test]
    fn standard_and_extended_agree() {
        let mut sku = Sku::new(Dims::new(40.0, 30.0, 25.0));
        sku.gap_xy = 1.0;
        sku.gap_z = 2.0;
        sku.side_margin = 3.0;
        let carton = Carton::new(7, Dims::new(310.0, 205.0, 180.0));
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &carton, 4.0, &mut log);

        assert!(eval.fits_anything());
        assert_eq!(eval.standard.box_id, eval.extended.box_id);
        assert_eq!(eval.standard.capacity, eval.extended.total_capacity);
        assert_eq!(eval.standard.void_ratio, eval.extended.void_ratio);
        assert_eq!(eval.standard.layers as usize, eval.extended.layers.len());
        let summed: u32 = eval.extended.layers.iter().map(|l| l.per_layer_capacity).sum();
        assert_eq!(summed, eval.extended.total_capacity);
    }

    #[test]
    fn void_ratio_is_zero_only_for_exact_fill() {
        let sku = Sku::new(Dims::new(50.0, 50.0, 50.0));
        let carton = Carton::new(1, Dims::new(100.0, 100.0, 100.0));
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &carton, 0.0, &mut log);
        assert_eq!(eval.capacity, 8);
        assert_eq!(eval.void_ratio, 0.0);

        let carton = Carton::new(2, Dims::new(101.0, 100.0, 100.0));
        let eval = evaluate_box(&sku, &carton, 0.0, &mut log);
        assert!(eval.void_ratio > 0.0 && eval.void_ratio < 1.0);
    }

    #[test]
    fn oversize_sku_has_zero_capacity_and_bounded_void() {
        let sku = Sku::new(Dims::new(500.0, 50.0, 30.0));
        let mut log = CalculationLog::new(true);
        let eval = evaluate_box(&sku, &scenario_a_box(), 0.0, &mut log);

        assert_eq!(eval.capacity, 0);
        assert!(eval.standard.grid.is_none());
        assert!(eval.void_ratio < 1.0);
        assert_eq!(eval.void_ratio, MAX_VOID_RATIO);
        assert!(!log.lines().is_empty(), "trace should mention the miss");
    }

    #[test]
    fn weight_limit_lowers_capacity() {
        let mut sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        sku.unit_weight_kg = Some(1.0);
        let carton = scenario_a_box().with_weights(60.0, 10.0); // 50 kg payload
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &carton, 0.0, &mut log);

        assert_eq!(eval.standard.layers, 2); // 50 / 24
        assert_eq!(eval.capacity, 48);
    }

    #[test]
    fn standing_stance_falls_back_to_flat() {
        // standing needs 60 mm of height, the carton only has 50
        let mut sku = Sku::new(Dims::new(100.0, 60.0, 10.0));
        sku.prefer_vertical = true;
        let mut log = CalculationLog::disabled();

        let low = Carton::new(1, Dims::new(100.0, 100.0, 50.0));
        let eval = evaluate_box(&sku, &low, 0.0, &mut log);
        assert_eq!(eval.stance, Some(Stance::Flat));
        assert_eq!(eval.capacity, 5);

        // flat 10 layers x 1, standing 1 layer x 10: the tie goes to standing
        let even = Carton::new(2, Dims::new(100.0, 100.0, 100.0));
        let eval = evaluate_box(&sku, &even, 0.0, &mut log);
        assert_eq!(eval.stance, Some(Stance::Standing));
        assert_eq!(eval.capacity, 10);

        // flat 12 layers x 1, standing 2 layers x 10
        let tall = Carton::new(3, Dims::new(100.0, 100.0, 120.0));
        let eval = evaluate_box(&sku, &tall, 0.0, &mut log);
        assert_eq!(eval.stance, Some(Stance::Standing));
        assert_eq!(eval.capacity, 20);
    }

    #[test]
    fn prefer_vertical_never_costs_capacity() {
        // flat: 3x3 per layer x 11 layers = 99, standing: 90 x 1 layer
        let mut sku = Sku::new(Dims::new(100.0, 100.0, 10.0));
        let carton = Carton::new(1, Dims::new(300.0, 300.0, 110.0));
        let mut log = CalculationLog::disabled();
        let flat = evaluate_box(&sku, &carton, 0.0, &mut log);

        sku.prefer_vertical = true;
        let biased = evaluate_box(&sku, &carton, 0.0, &mut log);

        assert_eq!(flat.capacity, 99);
        assert_eq!(biased.capacity, 99, "the vertical hint must not lower capacity");
        assert_eq!(biased.stance, Some(Stance::Flat));
        assert!(biased.void_ratio.abs() < EPSILON);
    }

    #[test]
    fn mixed_layout_reaches_the_extended_plan() {
        let sku = Sku::new(Dims::new(40.0, 30.0, 10.0));
        let carton = Carton::new(1, Dims::new(110.0, 70.0, 20.0));
        let mut log = CalculationLog::disabled();
        let eval = evaluate_box(&sku, &carton, 0.0, &mut log);

        assert_eq!(eval.capacity, 10);
        assert_eq!(
            eval.extended.layers[0].layout_type,
            LayoutType::MixedOrientation
        );
    }
}
