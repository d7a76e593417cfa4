//! Shipment plans and calculation results.
//!
//! The standard shapes report a layer count; the extended shapes carry every
//! layer so a renderer can redraw the carton. Both are produced from the same
//! evaluation and always agree on box, capacity and void ratio.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::geometry::{FootprintFit, Rotation, Stance};
use crate::layer::Layer;
use crate::types::Dims;

/// Grid of the dominant block of a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GridArrangement {
    pub stance: Stance,
    pub rotation: Rotation,
    pub orientation: Dims,
    pub count_x: u32,
    pub count_y: u32,
}

impl From<&FootprintFit> for GridArrangement {
    fn from(fit: &FootprintFit) -> Self {
        Self {
            stance: fit.stance,
            rotation: fit.rotation,
            orientation: fit.orientation,
            count_x: fit.count_x,
            count_y: fit.count_y,
        }
    }
}

/// Standard plan: one carton filled with identical layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "box_id": 1, "capacity": 144, "void_ratio": 0.0909, "layers": 6, "grid": { "stance": "flat", "rotation": "deg0", "orientation": { "w": 50.0, "d": 50.0, "h": 30.0 }, "count_x": 6, "count_y": 4 } }))]
pub struct ShipmentPlan {
    pub box_id: u32,
    /// Units per carton instance.
    pub capacity: u32,
    pub void_ratio: f64,
    /// Number of stacked layers.
    pub layers: u32,
    /// `None` when nothing fits.
    pub grid: Option<GridArrangement>,
}

/// Extended plan with an explicit layer list.
///
/// Also used for joint packing, where `sku_capacities[i]` is the number of
/// units of SKU `i` the carton holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtendedShipmentPlan {
    pub box_id: u32,
    pub total_capacity: u32,
    pub void_ratio: f64,
    pub layers: Vec<Layer>,
    pub sku_capacities: Vec<u32>,
    pub used_width: f64,
    pub used_depth: f64,
    pub used_height: f64,
}

/// A joint plan for several SKUs in one carton.
pub type MultiSkuPlan = ExtendedShipmentPlan;

/// One carton instance loaded with `quantity` units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Shipment {
    pub plan: ShipmentPlan,
    pub quantity: u32,
    /// Units per SKU index. A single entry for single-SKU calculations.
    pub sku_quantities: Vec<u32>,
}

/// Extended counterpart of [`Shipment`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtendedShipment {
    pub plan: ExtendedShipmentPlan,
    pub quantity: u32,
    pub sku_quantities: Vec<u32>,
}

/// Outcome of an allocator call.
///
/// `Σ shipments[i].quantity + leftover == total_quantity` always holds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalculationResult {
    pub shipments: Vec<Shipment>,
    pub leftover: u32,
    pub total_quantity: u32,
}

/// Extended counterpart of [`CalculationResult`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtendedCalculationResult {
    pub shipments: Vec<ExtendedShipment>,
    pub leftover: u32,
    pub total_quantity: u32,
}

impl CalculationResult {
    /// Units placed into shipments.
    pub fn shipped(&self) -> u64 {
        self.shipments.iter().map(|s| s.quantity as u64).sum()
    }
}

impl ExtendedCalculationResult {
    /// Units placed into shipments.
    pub fn shipped(&self) -> u64 {
        self.shipments.iter().map(|s| s.quantity as u64).sum()
    }
}
