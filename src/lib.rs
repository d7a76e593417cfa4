//! Carton selection and packing plans for a box catalog.
//!
//! Given a catalog of cartons and one or more SKUs, the engine computes how
//! many units fit per carton, splits order quantities into shipments and, for
//! mixed orders, searches orientation variants for the best joint packing.
//! Every calculation is pure; the optional [`trace::CalculationLog`] is owned
//! by the caller.

pub mod allocator;
pub mod api;
pub mod capacity;
pub mod config;
pub mod geometry;
pub mod layer;
pub mod model;
pub mod multi;
pub mod plan;
pub mod quantity_plan;
pub mod settings;
pub mod stack;
pub mod trace;
pub mod types;
pub mod variants;
pub mod weight;

pub use allocator::{
    AllocationOptions, choose_boxes_for_quantity, choose_boxes_for_quantity_extended,
    choose_single_box_for_quantity,
};
pub use model::{Carton, OrientationMode, Sku, ValidationError};
pub use multi::{
    MultiSkuOptions, choose_box_multi_sku_extended, choose_boxes_for_multi_sku,
    choose_boxes_for_multi_sku_extended,
};
pub use plan::{
    CalculationResult, ExtendedCalculationResult, ExtendedShipment, ExtendedShipmentPlan,
    MultiSkuPlan, Shipment, ShipmentPlan,
};
pub use quantity_plan::{QuantityGroup, build_quantity_plan};
pub use settings::{GeneralSettings, SkuInput, SkuOverride, resolve_sku};
pub use trace::CalculationLog;
pub use types::{Dims, EPSILON, compare_with_epsilon};
pub use variants::{SkuEntry, VariantSearchOutcome, search_orientation_variants};
pub use weight::{ShipmentWeight, shipment_weight};
