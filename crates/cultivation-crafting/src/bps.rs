//! Base-points (BPS) tables.
//!
//! Each selected material adds `tier × rarity weight × quantity` points to
//! every stat it is tagged with. The resulting weighted map decides which stat
//! lines a crafted item rolls; the inputs also fix the output's rarity ceiling,
//! element and tier.

use crate::error::CraftingResult;
use crate::material::{MaterialInventory, MaterialSelection};
use cultivation_common::{EligibilityError, Element, InvalidRecipeError, Rarity, StatKey, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weighted candidate stats and output properties for one craft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpsTable {
    /// Stat name to points.
    pub points: BTreeMap<String, f64>,
    /// Highest input rarity.
    pub rarity_ceiling: Rarity,
    /// Element with the most points.
    pub element: Option<Element>,
    /// Points-weighted mean input tier.
    pub tier: u32,
}

impl BpsTable {
    /// Sum of all points.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.points.values().sum()
    }
}

/// Builds the table from selections, checking ownership.
///
/// Selections of the same stack are summed before the ownership check.
pub fn build_bps_table(
    selections: &[MaterialSelection],
    inventory: &MaterialInventory,
) -> CraftingResult<BpsTable> {
    let mut needed: BTreeMap<(TemplateId, Rarity), u32> = BTreeMap::new();
    for selection in selections.iter().filter(|s| s.quantity > 0) {
        *needed.entry((selection.template, selection.rarity)).or_insert(0) += selection.quantity;
    }
    if needed.is_empty() {
        return Err(InvalidRecipeError::NoMaterials.into());
    }

    let mut points: BTreeMap<String, f64> = BTreeMap::new();
    let mut element_points: BTreeMap<Element, f64> = BTreeMap::new();
    let mut rarity_ceiling = Rarity::Common;
    let mut tier_sum = 0.0;
    let mut weight_sum = 0.0;

    for (&(template, rarity), &quantity) in &needed {
        let material = match inventory.get(template, rarity) {
            Some(m) if m.quantity >= quantity => m,
            other => {
                return Err(EligibilityError::InsufficientMaterial {
                    template,
                    needed: quantity,
                    have: other.map_or(0, |m| m.quantity),
                }
                .into());
            },
        };

        let weight = material.unit_points() * f64::from(quantity);
        for tag in &material.stat_tags {
            *points.entry(tag.clone()).or_insert(0.0) += weight;
        }
        if let Some(element) = material.element {
            *element_points.entry(element).or_insert(0.0) += weight;
        }
        rarity_ceiling = rarity_ceiling.max(rarity);
        tier_sum += f64::from(material.tier) * weight;
        weight_sum += weight;
    }

    // Ties resolve to the earliest element.
    let element = element_points
        .iter()
        .fold(None::<(Element, f64)>, |best, (&e, &w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((e, w)),
        })
        .map(|(e, _)| e);

    let tier = if weight_sum > 0.0 {
        (tier_sum / weight_sum).round().max(1.0) as u32
    } else {
        1
    };

    Ok(BpsTable {
        points,
        rarity_ceiling,
        element,
        tier,
    })
}

/// Checks total weight and stat names; returns the parsed weights.
pub fn validate_bps_table(table: &BpsTable) -> Result<Vec<(StatKey, f64)>, InvalidRecipeError> {
    let mut weights = Vec::with_capacity(table.points.len());
    for (name, &weight) in &table.points {
        let key: StatKey = name
            .parse()
            .map_err(|_| InvalidRecipeError::UnknownStat(name.clone()))?;
        weights.push((key, weight));
    }
    let total = table.total_weight();
    if !(total.is_finite() && total > 0.0) {
        return Err(InvalidRecipeError::ZeroWeight);
    }
    Ok(weights)
}
