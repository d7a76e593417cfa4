//! Orientation variant search for joint packing.
//!
//! Enumerates a bounded set of orientation variants (which auto SKUs are
//! stood up), runs the joint packers for each and keeps the best scoring one.
//! Variants are evaluated in parallel; the winner is picked sequentially in
//! enumeration order, so the outcome never depends on thread scheduling.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::model::{Carton, OrientationMode, Sku, ValidationError};
use crate::multi::{
    MultiSkuOptions, choose_box_multi_sku_extended, choose_boxes_for_multi_sku,
    choose_boxes_for_multi_sku_extended,
};
use crate::plan::{CalculationResult, ExtendedCalculationResult, MultiSkuPlan};
use crate::trace::CalculationLog;
use crate::types::{Dimensional, compare_f64};

/// Pairs and the triple are only enumerated up to this many auto SKUs.
pub const MAX_COMBINATORIAL_AUTO: usize = 3;

/// One SKU of a joint request with its orientation hint and quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkuEntry {
    pub sku: Sku,
    #[serde(default)]
    pub mode: OrientationMode,
    pub quantity: u32,
}

/// A candidate assignment of `prefer_vertical` to the auto SKUs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub label: String,
    /// Auto SKU indices stood up in this variant, sorted.
    pub vertical_indices: Vec<usize>,
    /// The baseline keeps every SKU exactly as requested.
    pub baseline: bool,
}

impl Variant {
    fn baseline() -> Self {
        Self {
            label: "base".to_string(),
            vertical_indices: Vec::new(),
            baseline: true,
        }
    }

    fn forced(label: String, vertical_indices: Vec<usize>) -> Self {
        Self {
            label,
            vertical_indices,
            baseline: false,
        }
    }
}

fn indices_with_mode(entries: &[SkuEntry], mode: OrientationMode) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.mode == mode)
        .map(|(index, _)| index)
        .collect()
}

/// Lists the variants to evaluate, baseline first.
///
/// Order: baseline, the stacked-only variant when stacked SKUs exist, all
/// auto SKUs vertical, each single auto SKU, then (for at most
/// [`MAX_COMBINATORIAL_AUTO`] auto SKUs) every pair and the triple. Forced
/// variants with an index set seen before are dropped.
pub fn enumerate_variants(entries: &[SkuEntry]) -> Vec<Variant> {
    let auto = indices_with_mode(entries, OrientationMode::Auto);
    let stacked = indices_with_mode(entries, OrientationMode::Stacked);

    let mut variants = vec![Variant::baseline()];
    if !stacked.is_empty() {
        variants.push(Variant::forced("vertical-stacked-base".to_string(), Vec::new()));
    }
    if auto.is_empty() {
        return variants;
    }

    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut add = |variants: &mut Vec<Variant>, label: String, indices: Vec<usize>| {
        let mut key = indices;
        key.sort_unstable();
        if seen.insert(key.clone()) {
            variants.push(Variant::forced(label, key));
        }
    };

    add(&mut variants, "vertical-all-auto".to_string(), auto.clone());
    for &index in &auto {
        add(&mut variants, format!("vertical-auto-{}", index), vec![index]);
    }
    if auto.len() <= MAX_COMBINATORIAL_AUTO {
        for (pos, &first) in auto.iter().enumerate() {
            for &second in &auto[pos + 1..] {
                add(
                    &mut variants,
                    format!("vertical-auto-{}-{}", first, second),
                    vec![first, second],
                );
            }
        }
        if auto.len() == MAX_COMBINATORIAL_AUTO {
            add(
                &mut variants,
                format!("vertical-auto-{}-{}-{}", auto[0], auto[1], auto[2]),
                auto.clone(),
            );
        }
    }
    variants
}

/// SKUs as packed under a variant.
///
/// Every entry first gets its orientation mode applied. Forced variants then
/// set `prefer_vertical` on auto SKUs by membership in the variant's index
/// set; stacked SKUs stay vertical.
pub fn apply_variant(entries: &[SkuEntry], variant: &Variant) -> Vec<Sku> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut sku = entry.sku.with_orientation_mode(entry.mode);
            if !variant.baseline && entry.mode == OrientationMode::Auto {
                sku.prefer_vertical = variant.vertical_indices.contains(&index);
            }
            sku
        })
        .collect()
}

/// Lexicographic quality of a variant, smaller is better.
///
/// Minimums are taken across the standard and the extended result. Absent
/// volume, void ratio or id (no shipments) rank last.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantScore {
    pub min_leftover: u32,
    pub min_shipments: u32,
    pub min_box_volume: Option<f64>,
    pub min_void_ratio: Option<f64>,
    pub min_box_id: Option<u32>,
}

fn compare_optional<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn min_f64(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

impl VariantScore {
    /// Scores the standard and extended results of one variant.
    pub fn of(
        boxes: &[Carton],
        standard: &CalculationResult,
        extended: &ExtendedCalculationResult,
    ) -> Self {
        let shipped: Vec<(u32, f64)> = standard
            .shipments
            .iter()
            .map(|s| (s.plan.box_id, s.plan.void_ratio))
            .chain(
                extended
                    .shipments
                    .iter()
                    .map(|s| (s.plan.box_id, s.plan.void_ratio)),
            )
            .collect();
        let volume_of = |id: u32| {
            boxes
                .iter()
                .find(|carton| carton.id == id)
                .map(|carton| carton.volume())
        };

        Self {
            min_leftover: standard.leftover.min(extended.leftover),
            min_shipments: standard.shipments.len().min(extended.shipments.len()) as u32,
            min_box_volume: min_f64(shipped.iter().filter_map(|(id, _)| volume_of(*id))),
            min_void_ratio: min_f64(shipped.iter().map(|(_, ratio)| *ratio)),
            min_box_id: shipped.iter().map(|(id, _)| *id).min(),
        }
    }

    /// Lexicographic comparison with `EPSILON` on the floating-point fields.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.min_leftover
            .cmp(&other.min_leftover)
            .then_with(|| self.min_shipments.cmp(&other.min_shipments))
            .then_with(|| {
                compare_optional(self.min_box_volume, other.min_box_volume, compare_f64)
            })
            .then_with(|| {
                compare_optional(self.min_void_ratio, other.min_void_ratio, compare_f64)
            })
            .then_with(|| compare_optional(self.min_box_id, other.min_box_id, |a, b| a.cmp(&b)))
    }
}

/// Results of all three packers for one variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantEvaluation {
    pub variant: Variant,
    pub score: VariantScore,
    pub standard: CalculationResult,
    pub extended: ExtendedCalculationResult,
    pub single_box: Option<MultiSkuPlan>,
}

/// A single-carton plan together with the variant that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SingleBoxChoice {
    pub variant_label: String,
    pub plan: MultiSkuPlan,
}

/// Outcome of [`search_orientation_variants`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantSearchOutcome {
    pub selected: VariantEvaluation,
    pub baseline_score: VariantScore,
    /// Best single-carton plan seen in any variant.
    pub best_single_box: Option<SingleBoxChoice>,
    pub variants_evaluated: u32,
}

fn evaluate_variant(
    boxes: &[Carton],
    entries: &[SkuEntry],
    quantities: &[u32],
    variant: &Variant,
    options: &MultiSkuOptions,
    log: &mut CalculationLog,
) -> Result<VariantEvaluation, ValidationError> {
    crate::trace_line!(
        log,
        "variant {} (vertical: {:?})",
        variant.label,
        variant.vertical_indices
    );
    let skus = apply_variant(entries, variant);
    let standard = choose_boxes_for_multi_sku(boxes, &skus, quantities, options, log)?;
    let extended = choose_boxes_for_multi_sku_extended(boxes, &skus, quantities, options, log)?;
    let single_box = choose_box_multi_sku_extended(
        boxes,
        &skus,
        quantities,
        options.box_id,
        options.box_padding,
        log,
    )?;
    let score = VariantScore::of(boxes, &standard, &extended);
    crate::trace_line!(log, "variant {} score {:?}", variant.label, score);

    Ok(VariantEvaluation {
        variant: variant.clone(),
        score,
        standard,
        extended,
        single_box,
    })
}

/// Smaller carton wins, then lower void ratio, then lower id.
fn better_single_box(candidate: &MultiSkuPlan, current: &MultiSkuPlan, boxes: &[Carton]) -> bool {
    let volume_of = |id: u32| {
        boxes
            .iter()
            .find(|carton| carton.id == id)
            .map_or(f64::INFINITY, |carton| carton.volume())
    };
    compare_f64(volume_of(candidate.box_id), volume_of(current.box_id))
        .then_with(|| compare_f64(candidate.void_ratio, current.void_ratio))
        .then_with(|| candidate.box_id.cmp(&current.box_id))
        == Ordering::Less
}

/// Runs the joint packers for every orientation variant and selects the best.
///
/// The selected score is never worse than the baseline's: a variant replaces
/// the current best only when it scores strictly better.
pub fn search_orientation_variants(
    boxes: &[Carton],
    entries: &[SkuEntry],
    options: &MultiSkuOptions,
    log: &mut CalculationLog,
) -> Result<VariantSearchOutcome, ValidationError> {
    let quantities: Vec<u32> = entries.iter().map(|entry| entry.quantity).collect();
    let variants = enumerate_variants(entries);
    crate::trace_line!(log, "evaluating {} orientation variants", variants.len());

    let template = log.child();
    let evaluated: Vec<(Result<VariantEvaluation, ValidationError>, CalculationLog)> = variants
        .par_iter()
        .map(|variant| {
            let mut child = template.child();
            let result = evaluate_variant(boxes, entries, &quantities, variant, options, &mut child);
            (result, child)
        })
        .collect();

    let mut evaluations = Vec::with_capacity(evaluated.len());
    for (result, child) in evaluated {
        log.merge(child);
        evaluations.push(result?);
    }

    let mut iter = evaluations.into_iter();
    let Some(baseline) = iter.next() else {
        return Err(ValidationError::InvalidQuantity(
            "no variants to evaluate".to_string(),
        ));
    };
    let baseline_score = baseline.score;
    let mut best_single_box = baseline.single_box.clone().map(|plan| SingleBoxChoice {
        variant_label: baseline.variant.label.clone(),
        plan,
    });
    let mut selected = baseline;
    let mut count = 1u32;

    for evaluation in iter {
        count += 1;
        if let Some(plan) = &evaluation.single_box {
            let replace = best_single_box
                .as_ref()
                .is_none_or(|current| better_single_box(plan, &current.plan, boxes));
            if replace {
                best_single_box = Some(SingleBoxChoice {
                    variant_label: evaluation.variant.label.clone(),
                    plan: plan.clone(),
                });
            }
        }
        if evaluation.score.compare(&selected.score) == Ordering::Less {
            crate::trace_line!(log, "variant {} improves the score", evaluation.variant.label);
            selected = evaluation;
        }
    }

    tracing::debug!(
        "🔄 Variant search picked '{}' out of {} variants",
        selected.variant.label,
        count
    );

    Ok(VariantSearchOutcome {
        selected,
        baseline_score,
        best_single_box,
        variants_evaluated: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    fn entry(dims: Dims, mode: OrientationMode, quantity: u32) -> SkuEntry {
        SkuEntry {
            sku: Sku::new(dims),
            mode,
            quantity,
        }
    }

    fn labels(variants: &[Variant]) -> Vec<&str> {
        variants.iter().map(|v| v.label.as_str()).collect()
    }

    #[test]
    fn enumeration_order_and_dedup() {
        let entries = vec![
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
        ];
        let variants = enumerate_variants(&entries);
        // the pair {0, 1} equals the all-auto set and is dropped
        assert_eq!(
            labels(&variants),
            vec!["base", "vertical-all-auto", "vertical-auto-0", "vertical-auto-1"]
        );
    }

    #[test]
    fn three_auto_skus_get_pairs_and_triple() {
        let entries = vec![
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Stacked, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
        ];
        let variants = enumerate_variants(&entries);
        assert_eq!(
            labels(&variants),
            vec![
                "base",
                "vertical-stacked-base",
                "vertical-all-auto",
                "vertical-auto-0",
                "vertical-auto-2",
                "vertical-auto-3",
                "vertical-auto-0-2",
                "vertical-auto-0-3",
                "vertical-auto-2-3",
            ],
            "the triple equals the all-auto set"
        );
    }

    #[test]
    fn many_auto_skus_skip_combinations() {
        let entries: Vec<SkuEntry> = (0..5)
            .map(|_| entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1))
            .collect();
        let variants = enumerate_variants(&entries);
        assert_eq!(variants.len(), 1 + 1 + 5);
    }

    #[test]
    fn no_auto_or_stacked_means_baseline_only() {
        let entries = vec![
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Flat, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Vertical, 1),
        ];
        assert_eq!(labels(&enumerate_variants(&entries)), vec!["base"]);
    }

    #[test]
    fn apply_variant_sets_prefer_vertical_by_membership() {
        let mut entries = vec![
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Auto, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Stacked, 1),
            entry(Dims::new(50.0, 40.0, 30.0), OrientationMode::Flat, 1),
        ];
        entries[1].sku.prefer_vertical = true;

        let base = apply_variant(&entries, &Variant::baseline());
        assert!(!base[0].prefer_vertical);
        assert!(base[1].prefer_vertical, "baseline keeps the caller's flags");
        assert!(base[2].prefer_vertical);
        assert!(base[3].keep_upright);

        let forced = apply_variant(
            &entries,
            &Variant::forced("vertical-auto-0".to_string(), vec![0]),
        );
        assert!(forced[0].prefer_vertical);
        assert!(!forced[1].prefer_vertical);
        assert!(forced[2].prefer_vertical);
        assert!(!forced[3].prefer_vertical);
    }

    #[test]
    fn score_compares_lexicographically() {
        let base = VariantScore {
            min_leftover: 0,
            min_shipments: 2,
            min_box_volume: Some(1000.0),
            min_void_ratio: Some(0.2),
            min_box_id: Some(3),
        };
        let fewer_shipments = VariantScore {
            min_shipments: 1,
            min_box_volume: Some(5000.0),
            ..base
        };
        assert_eq!(fewer_shipments.compare(&base), Ordering::Less);

        let nearly_equal_volume = VariantScore {
            min_box_volume: Some(1000.0 + 1e-9),
            min_void_ratio: Some(0.1),
            ..base
        };
        assert_eq!(nearly_equal_volume.compare(&base), Ordering::Less);

        let nothing_shipped = VariantScore {
            min_box_volume: None,
            min_void_ratio: None,
            min_box_id: None,
            ..base
        };
        assert_eq!(nothing_shipped.compare(&base), Ordering::Greater);
    }

    fn mixed_request() -> (Vec<Carton>, Vec<SkuEntry>) {
        let boxes = vec![
            Carton::new(1, Dims::new(300.0, 220.0, 200.0)),
            Carton::new(2, Dims::new(400.0, 300.0, 160.0)),
            Carton::new(3, Dims::new(200.0, 150.0, 100.0)),
        ];
        let entries = vec![
            entry(Dims::new(190.0, 135.0, 15.0), OrientationMode::Auto, 12),
            entry(Dims::new(60.0, 40.0, 35.0), OrientationMode::Auto, 30),
            entry(Dims::new(80.0, 80.0, 20.0), OrientationMode::Stacked, 5),
        ];
        (boxes, entries)
    }

    #[test]
    fn selected_score_is_never_worse_than_baseline() {
        let (boxes, entries) = mixed_request();
        let mut log = CalculationLog::disabled();
        let outcome =
            search_orientation_variants(&boxes, &entries, &MultiSkuOptions::default(), &mut log)
                .expect("valid input");

        assert_ne!(
            outcome.selected.score.compare(&outcome.baseline_score),
            Ordering::Greater
        );
        assert_eq!(
            outcome.variants_evaluated as usize,
            enumerate_variants(&entries).len()
        );
        let total: u64 = entries.iter().map(|e| e.quantity as u64).sum();
        let standard = &outcome.selected.standard;
        assert_eq!(standard.shipped() + standard.leftover as u64, total);
    }

    #[test]
    fn search_is_deterministic() {
        let (boxes, entries) = mixed_request();
        let options = MultiSkuOptions::default();
        let mut first_log = CalculationLog::new(true);
        let mut second_log = CalculationLog::new(true);
        let first = search_orientation_variants(&boxes, &entries, &options, &mut first_log)
            .expect("valid input");
        let second = search_orientation_variants(&boxes, &entries, &options, &mut second_log)
            .expect("valid input");

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serializable"),
            serde_json::to_string(&second).expect("serializable")
        );
        assert_eq!(first_log.lines(), second_log.lines(), "trace order is fixed");
    }

    #[test]
    fn trace_lines_follow_enumeration_order() {
        let (boxes, entries) = mixed_request();
        let mut log = CalculationLog::new(true);
        search_orientation_variants(&boxes, &entries, &MultiSkuOptions::default(), &mut log)
            .expect("valid input");

        let headers: Vec<&String> = log
            .lines()
            .iter()
            .filter(|line| line.starts_with("variant ") && line.contains("(vertical:"))
            .collect();
        let expected: Vec<String> = enumerate_variants(&entries)
            .iter()
            .map(|v| format!("variant {} ", v.label))
            .collect();
        assert_eq!(headers.len(), expected.len());
        for (line, prefix) in headers.iter().zip(&expected) {
            assert!(line.starts_with(prefix.as_str()), "{} vs {}", line, prefix);
        }
    }

    #[test]
    fn invalid_entry_is_rejected() {
        let (boxes, mut entries) = mixed_request();
        entries[0].sku.gap_xy = -1.0;
        let mut log = CalculationLog::disabled();
        let result =
            search_orientation_variants(&boxes, &entries, &MultiSkuOptions::default(), &mut log);
        assert!(matches!(result, Err(ValidationError::InvalidMargin(_))));
    }
}
