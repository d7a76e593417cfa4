//! Vertical stacking: how many layers a carton takes.

use serde::Serialize;
use utoipa::ToSchema;

use crate::types::floor_count;

/// The bound that decided the layer count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StackLimit {
    Height,
    MaxStackLayers,
    Weight,
}

/// Inputs of the stack planner for one SKU in one carton.
#[derive(Clone, Copy, Debug)]
pub struct StackInput {
    pub unit_height: f64,
    pub gap_z: f64,
    /// `H − top_margin`
    pub usable_height: f64,
    pub max_stack_layers: Option<u32>,
    pub per_layer_capacity: u32,
    pub unit_weight_kg: Option<f64>,
    /// `max_weight_kg − box_weight_kg`, `None` for cartons without a limit.
    pub payload_kg: Option<f64>,
}

/// Layer count with the individual caps that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackPlan {
    pub layers: u32,
    pub layers_by_height: u32,
    pub layers_by_weight: Option<u32>,
    pub limited_by: StackLimit,
}

/// Computes the layer count.
///
/// `floor(usable_height / (h + gap_z))`, clamped to `max_stack_layers` and to
/// `floor(payload / (unit_weight × per_layer))` when a unit weight and a
/// carton weight limit are both known. A weight cap below the volumetric one
/// is not an error, it only lowers the count.
pub fn plan_stack(input: &StackInput) -> StackPlan {
    let layers_by_height = floor_count(input.usable_height, input.unit_height + input.gap_z);

    let mut layers = layers_by_height;
    let mut limited_by = StackLimit::Height;

    if let Some(max) = input.max_stack_layers {
        if max < layers {
            layers = max;
            limited_by = StackLimit::MaxStackLayers;
        }
    }

    let layers_by_weight = match (input.unit_weight_kg, input.payload_kg) {
        (Some(unit), Some(payload)) if unit > 0.0 && input.per_layer_capacity > 0 => Some(
            floor_count(payload, unit * input.per_layer_capacity as f64),
        ),
        _ => None,
    };
    if let Some(by_weight) = layers_by_weight {
        if by_weight < layers {
            layers = by_weight;
            limited_by = StackLimit::Weight;
        }
    }

    StackPlan {
        layers,
        layers_by_height,
        layers_by_weight,
        limited_by,
    }
}
