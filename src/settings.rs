//! Settings resolution for SKU profiles.
//!
//! A caller entry may leave any clearance unset. The value is then taken from
//! the per-SKU override record, then from the general defaults, then from a
//! fixed fallback.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::model::Sku;
use crate::types::Dims;

/// Catalog-wide defaults for clearances.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeneralSettings {
    #[serde(default)]
    pub default_side_margin: Option<f64>,
    #[serde(default)]
    pub default_front_margin: Option<f64>,
    #[serde(default)]
    pub default_top_margin: Option<f64>,
    #[serde(default)]
    pub default_gap_xy: Option<f64>,
    #[serde(default)]
    pub default_gap_z: Option<f64>,
    #[serde(default)]
    pub default_max_stack_layers: Option<u32>,
}

/// Stored per-SKU overrides keyed by SKU id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkuOverride {
    pub sku_id: String,
    #[serde(default)]
    pub side_margin: Option<f64>,
    #[serde(default)]
    pub front_margin: Option<f64>,
    #[serde(default)]
    pub top_margin: Option<f64>,
    #[serde(default)]
    pub gap_xy: Option<f64>,
    #[serde(default)]
    pub gap_z: Option<f64>,
    #[serde(default)]
    pub max_stack_layers: Option<u32>,
}

/// A SKU as entered by a caller, with every clearance optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "sku_id": "A-100", "dims": { "w": 50.0, "d": 50.0, "h": 30.0 }, "gap_xy": 1.0 }))]
pub struct SkuInput {
    #[serde(default)]
    pub sku_id: Option<String>,
    pub dims: Dims,
    #[serde(default)]
    pub keep_upright: bool,
    #[serde(default)]
    pub prefer_vertical: bool,
    #[serde(default)]
    pub side_margin: Option<f64>,
    #[serde(default)]
    pub front_margin: Option<f64>,
    #[serde(default)]
    pub top_margin: Option<f64>,
    #[serde(default)]
    pub gap_xy: Option<f64>,
    #[serde(default)]
    pub gap_z: Option<f64>,
    #[serde(default)]
    pub max_stack_layers: Option<u32>,
    #[serde(default)]
    pub unit_weight_kg: Option<f64>,
}

impl From<Sku> for SkuInput {
    fn from(sku: Sku) -> Self {
        Self {
            sku_id: None,
            dims: sku.dims,
            keep_upright: sku.keep_upright,
            prefer_vertical: sku.prefer_vertical,
            side_margin: Some(sku.side_margin),
            front_margin: Some(sku.front_margin),
            top_margin: Some(sku.top_margin),
            gap_xy: Some(sku.gap_xy),
            gap_z: Some(sku.gap_z),
            max_stack_layers: sku.max_stack_layers,
            unit_weight_kg: sku.unit_weight_kg,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// First finite value of direct → override → default, else `fallback`.
pub fn resolve_setting(
    direct: Option<f64>,
    override_value: Option<f64>,
    default_value: Option<f64>,
    fallback: f64,
) -> f64 {
    resolve_optional_setting(direct, override_value, default_value).unwrap_or(fallback)
}

/// Like [`resolve_setting`] without a fallback.
pub fn resolve_optional_setting(
    direct: Option<f64>,
    override_value: Option<f64>,
    default_value: Option<f64>,
) -> Option<f64> {
    finite(direct)
        .or(finite(override_value))
        .or(finite(default_value))
}

/// Builds the packing profile of a caller entry.
///
/// The override record is looked up by `sku_id`; entries without an id only
/// see the general defaults.
pub fn resolve_sku(input: &SkuInput, overrides: &[SkuOverride], general: &GeneralSettings) -> Sku {
    let record = input
        .sku_id
        .as_deref()
        .and_then(|id| overrides.iter().find(|o| o.sku_id == id));
    let field = |pick: fn(&SkuOverride) -> Option<f64>| record.and_then(pick);

    Sku {
        dims: input.dims,
        keep_upright: input.keep_upright,
        prefer_vertical: input.prefer_vertical,
        side_margin: resolve_setting(
            input.side_margin,
            field(|o| o.side_margin),
            general.default_side_margin,
            0.0,
        ),
        front_margin: resolve_setting(
            input.front_margin,
            field(|o| o.front_margin),
            general.default_front_margin,
            0.0,
        ),
        top_margin: resolve_setting(
            input.top_margin,
            field(|o| o.top_margin),
            general.default_top_margin,
            0.0,
        ),
        gap_xy: resolve_setting(
            input.gap_xy,
            field(|o| o.gap_xy),
            general.default_gap_xy,
            0.0,
        ),
        gap_z: resolve_setting(input.gap_z, field(|o| o.gap_z), general.default_gap_z, 0.0),
        max_stack_layers: input
            .max_stack_layers
            .or(record.and_then(|o| o.max_stack_layers))
            .or(general.default_max_stack_layers),
        unit_weight_kg: input.unit_weight_kg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(sku_id: Option<&str>) -> SkuInput {
        SkuInput {
            sku_id: sku_id.map(str::to_string),
            dims: Dims::new(50.0, 40.0, 30.0),
            keep_upright: false,
            prefer_vertical: false,
            side_margin: None,
            front_margin: None,
            top_margin: None,
            gap_xy: None,
            gap_z: None,
            max_stack_layers: None,
            unit_weight_kg: None,
        }
    }

    #[test]
    fn resolution_order_is_direct_override_default_fallback() {
        assert_eq!(resolve_setting(Some(1.0), Some(2.0), Some(3.0), 4.0), 1.0);
        assert_eq!(resolve_setting(None, Some(2.0), Some(3.0), 4.0), 2.0);
        assert_eq!(resolve_setting(None, None, Some(3.0), 4.0), 3.0);
        assert_eq!(resolve_setting(None, None, None, 4.0), 4.0);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        assert_eq!(resolve_setting(Some(f64::NAN), Some(2.0), None, 0.0), 2.0);
        assert_eq!(resolve_optional_setting(Some(f64::INFINITY), None, None), None);
    }

    #[test]
    fn sku_picks_override_by_id() {
        let overrides = vec![
            SkuOverride {
                sku_id: "A".to_string(),
                side_margin: Some(5.0),
                max_stack_layers: Some(3),
                ..SkuOverride::default()
            },
            SkuOverride {
                sku_id: "B".to_string(),
                side_margin: Some(9.0),
                ..SkuOverride::default()
            },
        ];
        let general = GeneralSettings {
            default_side_margin: Some(1.0),
            default_gap_xy: Some(2.0),
            default_max_stack_layers: Some(8),
            ..GeneralSettings::default()
        };

        let sku = resolve_sku(&input(Some("A")), &overrides, &general);
        assert_eq!(sku.side_margin, 5.0);
        assert_eq!(sku.gap_xy, 2.0);
        assert_eq!(sku.gap_z, 0.0);
        assert_eq!(sku.max_stack_layers, Some(3));

        let anonymous = resolve_sku(&input(None), &overrides, &general);
        assert_eq!(anonymous.side_margin, 1.0);
        assert_eq!(anonymous.max_stack_layers, Some(8));

        let mut direct = input(Some("B"));
        direct.side_margin = Some(0.0);
        assert_eq!(resolve_sku(&direct, &overrides, &general).side_margin, 0.0);
    }

    #[test]
    fn sku_round_trips_through_input() {
        let mut sku = Sku::new(Dims::new(10.0, 20.0, 30.0));
        sku.gap_z = 2.0;
        sku.max_stack_layers = Some(4);
        let general = GeneralSettings {
            default_gap_z: Some(7.0),
            ..GeneralSettings::default()
        };
        let resolved = resolve_sku(&SkuInput::from(sku.clone()), &[], &general);
        assert_eq!(resolved, sku, "explicit values beat the defaults");
    }
}
