//! Data models for the box calculator.
//!
//! This module defines the inputs every packing stage consumes:
//! - `Carton`: a candidate shipping box from the catalog
//! - `Sku`: the packing profile of one product
//! - `OrientationMode`: the per-SKU orientation hint used by the variant search
//!
//! Inputs are immutable for the duration of a calculation. Validation happens
//! once at the public entry points; internal helpers assume valid data.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensional, Dims};

/// Validation error for calculation inputs.
///
/// This is the only error the engine raises. "Nothing fits" is never an
/// error; it shows up as `leftover > 0` or an absent plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid margin: {0}")]
    InvalidMargin(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_non_negative(value: f64, name: &str) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidMargin(format!(
            "{} must be a finite value >= 0, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_optional_weight(value: Option<f64>, name: &str) -> Result<(), ValidationError> {
    match value {
        Some(w) if w < 0.0 || !w.is_finite() => Err(ValidationError::InvalidWeight(format!(
            "{} must be a finite value >= 0, got: {}",
            name, w
        ))),
        _ => Ok(()),
    }
}

fn validate_dims(dims: &Dims, owner: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.w, &format!("{} width", owner))?;
    validate_dimension(dims.d, &format!("{} depth", owner))?;
    validate_dimension(dims.h, &format!("{} height", owner))?;
    Ok(())
}

/// A candidate shipping carton from the box catalog.
///
/// # Fields
/// * `id` - Stable catalog identifier
/// * `inner` - Usable inner dimensions (W, D, H) in mm
/// * `max_weight_kg` - Maximum gross weight, if the carton has a limit
/// * `box_weight_kg` - Weight of the empty carton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "id": 1, "inner": { "w": 300.0, "d": 220.0, "h": 200.0 }, "max_weight_kg": 20.0, "box_weight_kg": 0.4 }))]
pub struct Carton {
    pub id: u32,
    pub inner: Dims,
    #[serde(default)]
    pub max_weight_kg: Option<f64>,
    #[serde(default)]
    pub box_weight_kg: Option<f64>,
}

impl Carton {
    /// Creates a new carton without weight limits.
    pub fn new(id: u32, inner: Dims) -> Self {
        Self {
            id,
            inner,
            max_weight_kg: None,
            box_weight_kg: None,
        }
    }

    /// Stores the weight limits (Builder pattern light).
    pub fn with_weights(mut self, max_weight_kg: f64, box_weight_kg: f64) -> Self {
        self.max_weight_kg = Some(max_weight_kg);
        self.box_weight_kg = Some(box_weight_kg);
        self
    }

    /// Weight the contents may add before the carton's limit is reached.
    ///
    /// `None` when the carton has no limit.
    pub fn payload_capacity_kg(&self) -> Option<f64> {
        self.max_weight_kg
            .map(|max| (max - self.box_weight_kg.unwrap_or(0.0)).max(0.0))
    }

    /// Checks the catalog entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dims(&self.inner, &format!("Box {}", self.id))?;
        validate_optional_weight(self.max_weight_kg, "max_weight_kg")?;
        validate_optional_weight(self.box_weight_kg, "box_weight_kg")?;
        Ok(())
    }
}

impl Dimensional for Carton {
    fn dimensions(&self) -> Dims {
        self.inner
    }
}

/// A product's packing profile.
///
/// # Fields
/// * `dims` - Bounding box of one unit
/// * `keep_upright` - Forbids rotating the unit (vertical axis and footprint swap)
/// * `prefer_vertical` - Soft bias to stand the unit on its long edge
/// * `side_margin` / `front_margin` / `top_margin` - Clearance to the carton walls
/// * `gap_xy` / `gap_z` - Spacing between neighbouring units and between layers
/// * `max_stack_layers` - Optional cap on stacked layers
/// * `unit_weight_kg` - Optional weight of one unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sku {
    pub dims: Dims,
    #[serde(default)]
    pub keep_upright: bool,
    #[serde(default)]
    pub prefer_vertical: bool,
    #[serde(default)]
    pub side_margin: f64,
    #[serde(default)]
    pub front_margin: f64,
    #[serde(default)]
    pub top_margin: f64,
    #[serde(default)]
    pub gap_xy: f64,
    #[serde(default)]
    pub gap_z: f64,
    #[serde(default)]
    pub max_stack_layers: Option<u32>,
    #[serde(default)]
    pub unit_weight_kg: Option<f64>,
}

impl Sku {
    /// Creates a SKU with no margins, gaps or constraints.
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            keep_upright: false,
            prefer_vertical: false,
            side_margin: 0.0,
            front_margin: 0.0,
            top_margin: 0.0,
            gap_xy: 0.0,
            gap_z: 0.0,
            max_stack_layers: None,
            unit_weight_kg: None,
        }
    }

    /// Unit weight if one is configured and positive.
    pub fn effective_unit_weight(&self) -> Option<f64> {
        self.unit_weight_kg.filter(|w| *w > 0.0)
    }

    /// Checks dimensions, clearances and weight.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dims(&self.dims, "SKU")?;
        validate_non_negative(self.side_margin, "side_margin")?;
        validate_non_negative(self.front_margin, "front_margin")?;
        validate_non_negative(self.top_margin, "top_margin")?;
        validate_non_negative(self.gap_xy, "gap_xy")?;
        validate_non_negative(self.gap_z, "gap_z")?;
        validate_optional_weight(self.unit_weight_kg, "unit_weight_kg")?;
        Ok(())
    }

    /// Applies an orientation mode, returning the adjusted profile.
    pub fn with_orientation_mode(&self, mode: OrientationMode) -> Self {
        let mut sku = self.clone();
        match mode {
            OrientationMode::Auto => {}
            OrientationMode::Flat => {
                sku.keep_upright = true;
                sku.prefer_vertical = false;
            }
            OrientationMode::Vertical | OrientationMode::Stacked => {
                sku.keep_upright = false;
                sku.prefer_vertical = true;
            }
        }
        sku
    }
}

impl Dimensional for Sku {
    fn dimensions(&self) -> Dims {
        self.dims
    }
}

/// Per-SKU orientation hint set by the caller.
///
/// `Auto` leaves the layer planner free; the others force a combination of
/// `keep_upright` / `prefer_vertical`. `Stacked` behaves like `Vertical` for a
/// single SKU but is always forced vertical during the variant search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    #[default]
    Auto,
    Vertical,
    Stacked,
    Flat,
}

/// Validates a whole box catalog.
pub fn validate_catalog(boxes: &[Carton]) -> Result<(), ValidationError> {
    boxes.iter().try_for_each(Carton::validate)
}

/// Upper bound for `carton extent / unit extent` along any axis.
///
/// Layer and stack counts never exceed it, which bounds the size of every
/// extended plan.
pub const MAX_UNITS_PER_AXIS: f64 = 10_000.0;

/// Rejects carton and SKU pairs whose size ratio exceeds [`MAX_UNITS_PER_AXIS`].
///
/// Compares the largest carton edge with the smallest SKU edge, so the
/// bound holds for every stance and rotation.
pub fn validate_proportions(boxes: &[Carton], sku: &Sku) -> Result<(), ValidationError> {
    let smallest = sku.dims.w.min(sku.dims.d).min(sku.dims.h);
    for carton in boxes {
        let largest = carton.inner.w.max(carton.inner.d).max(carton.inner.h);
        if largest / smallest > MAX_UNITS_PER_AXIS {
            return Err(ValidationError::InvalidDimension(format!(
                "Box {} is more than {} times the smallest SKU edge ({} / {})",
                carton.id, MAX_UNITS_PER_AXIS, largest, smallest
            )));
        }
    }
    Ok(())
}

/// Validates a box padding value.
pub fn validate_padding(box_padding: f64) -> Result<(), ValidationError> {
    validate_non_negative(box_padding, "box_padding")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_rejects_non_positive_dimensions() {
        let sku = Sku::new(Dims::new(-10.0, 20.0, 30.0));
        assert!(matches!(
            sku.validate(),
            Err(ValidationError::InvalidDimension(_))
        ));

        let sku = Sku::new(Dims::new(10.0, 20.0, f64::NAN));
        assert!(sku.validate().is_err());
    }

    #[test]
    fn sku_rejects_negative_margins_and_gaps() {
        let mut sku = Sku::new(Dims::new(10.0, 10.0, 10.0));
        sku.side_margin = -1.0;
        assert!(matches!(
            sku.validate(),
            Err(ValidationError::InvalidMargin(_))
        ));

        let mut sku = Sku::new(Dims::new(10.0, 10.0, 10.0));
        sku.gap_z = f64::INFINITY;
        assert!(sku.validate().is_err());
    }

    #[test]
    fn carton_rejects_negative_weights() {
        let carton = Carton::new(1, Dims::new(100.0, 100.0, 100.0)).with_weights(-1.0, 0.0);
        assert!(matches!(
            carton.validate(),
            Err(ValidationError::InvalidWeight(_))
        ));
    }

    #[test]
    fn payload_capacity_subtracts_empty_box_weight() {
        let carton = Carton::new(1, Dims::new(100.0, 100.0, 100.0)).with_weights(10.0, 0.5);
        assert_eq!(carton.payload_capacity_kg(), Some(9.5));
        assert_eq!(Carton::new(2, Dims::new(1.0, 1.0, 1.0)).payload_capacity_kg(), None);

        let overweight_box = Carton::new(3, Dims::new(1.0, 1.0, 1.0)).with_weights(1.0, 2.0);
        assert_eq!(overweight_box.payload_capacity_kg(), Some(0.0));
    }

    #[test]
    fn orientation_modes_force_flags() {
        let base = Sku::new(Dims::new(10.0, 20.0, 30.0));

        let flat = base.with_orientation_mode(OrientationMode::Flat);
        assert!(flat.keep_upright && !flat.prefer_vertical);

        let vertical = base.with_orientation_mode(OrientationMode::Vertical);
        assert!(!vertical.keep_upright && vertical.prefer_vertical);

        let stacked = base.with_orientation_mode(OrientationMode::Stacked);
        assert_eq!(stacked, vertical);

        assert_eq!(base.with_orientation_mode(OrientationMode::Auto), base);
    }

    #[test]
    fn sku_deserializes_with_defaults() {
        let json = r#"{ "dims": { "w": 50.0, "d": 40.0, "h": 30.0 } }"#;
        let sku: Sku = serde_json::from_str(json).expect("Should parse minimal SKU");
        assert_eq!(sku, Sku::new(Dims::new(50.0, 40.0, 30.0)));
    }

    #[test]
    fn extreme_carton_to_unit_ratio_is_rejected() {
        let sku = Sku::new(Dims::new(1.0, 5.0, 5.0));
        let fine = vec![Carton::new(1, Dims::new(10_000.0, 100.0, 100.0))];
        assert!(validate_proportions(&fine, &sku).is_ok());

        let tall = vec![Carton::new(2, Dims::new(100.0, 100.0, 1e9))];
        assert!(matches!(
            validate_proportions(&tall, &sku),
            Err(ValidationError::InvalidDimension(_))
        ));
    }
}
