//! Weight breakdown of a shipment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{Carton, Sku};
use crate::types::Dimensional;

const MM3_PER_M3: f64 = 1_000_000_000.0;

/// Product, carton and packaging weight of one shipment in kg.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShipmentWeight {
    pub product_kg: f64,
    pub box_kg: f64,
    /// Filler material, proportional to the carton's inner volume.
    pub packaging_kg: f64,
    pub total_kg: f64,
}

/// Weighs a shipment.
///
/// `sku_quantities[i]` units of `skus[i]`; SKUs without a unit weight count as
/// zero. Packaging is `inner volume (m³) × packaging_multiplier`. Without a
/// carton only the product weight is reported.
pub fn shipment_weight(
    skus: &[Sku],
    sku_quantities: &[u32],
    carton: Option<&Carton>,
    packaging_multiplier: f64,
) -> ShipmentWeight {
    let product_kg: f64 = skus
        .iter()
        .zip(sku_quantities)
        .map(|(sku, qty)| sku.unit_weight_kg.unwrap_or(0.0) * *qty as f64)
        .sum();
    let box_kg = carton.and_then(|c| c.box_weight_kg).unwrap_or(0.0);
    let packaging_kg = carton
        .map(|c| c.volume() / MM3_PER_M3 * packaging_multiplier)
        .unwrap_or(0.0);

    ShipmentWeight {
        product_kg,
        box_kg,
        packaging_kg,
        total_kg: product_kg + box_kg + packaging_kg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    #[test]
    fn total_is_product_plus_box_plus_packaging() {
        let mut sku = Sku::new(Dims::new(50.0, 50.0, 30.0));
        sku.unit_weight_kg = Some(0.25);
        // 0.5 x 0.4 x 0.3 m = 0.06 m³
        let carton = Carton::new(1, Dims::new(500.0, 400.0, 300.0)).with_weights(20.0, 0.8);

        let weight = shipment_weight(&[sku], &[10], Some(&carton), 5.0);
        assert!((weight.product_kg - 2.5).abs() < 1e-9);
        assert!((weight.box_kg - 0.8).abs() < 1e-9);
        assert!((weight.packaging_kg - 0.3).abs() < 1e-9);
        assert!((weight.total_kg - 3.6).abs() < 1e-9);
    }

    #[test]
    fn multi_sku_weights_add_up_and_missing_weights_count_zero() {
        let mut heavy = Sku::new(Dims::new(10.0, 10.0, 10.0));
        heavy.unit_weight_kg = Some(2.0);
        let unweighed = Sku::new(Dims::new(10.0, 10.0, 10.0));

        let weight = shipment_weight(&[heavy, unweighed], &[3, 100], None, 5.0);
        assert_eq!(weight.product_kg, 6.0);
        assert_eq!(weight.packaging_kg, 0.0);
        assert_eq!(weight.total_kg, 6.0);
    }
}
