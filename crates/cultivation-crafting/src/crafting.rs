//! The crafting RNG engine.
//!
//! A craft runs in two phases. `preview` builds and validates the base-points
//! table and reports the odds including the caller's pity; `execute` repeats
//! that validation, rolls once, and only then consumes materials and updates
//! pity. An attempt that fails validation consumes nothing and rolls nothing.

use crate::bps::{build_bps_table, validate_bps_table};
use crate::error::CraftingResult;
use crate::material::{MaterialInventory, MaterialSelection};
use crate::pity::{InMemoryPityLedger, OutcomeOdds, PityConfig, PityLedger};
use cultivation_combat::{EquipSlot, EquipmentItem, EquipmentTemplate};
use cultivation_common::{ConfigurationError, Element, Rarity, RollSource, StatKey, TemplateId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Configuration
// ============================================================================

/// Crafting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingConfig {
    /// Pity and base odds.
    pub pity: PityConfig,
    /// Upgrade chance added to every craft (events, sect perks).
    pub bonus_upgrade: f64,
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            pity: PityConfig::default(),
            bonus_upgrade: 0.0,
        }
    }
}

impl CraftingConfig {
    /// Clamp settings to sensible ranges.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        self.pity.validate()?;
        if !self.bonus_upgrade.is_finite() {
            return Err(ConfigurationError::Invalid(format!(
                "crafting bonus_upgrade is {}",
                self.bonus_upgrade
            )));
        }
        self.bonus_upgrade = self.bonus_upgrade.clamp(0.0, 1.0);
        Ok(())
    }
}

// ============================================================================
// Requests & Results
// ============================================================================

/// A craft attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftRequest {
    /// Crafting user; pity is tracked per user.
    pub user: UserId,
    /// Template id stamped on the produced item.
    pub template: TemplateId,
    /// Slot of the produced item.
    pub slot: EquipSlot,
    /// Subtype name of the produced item.
    pub subtype: String,
    /// Materials to use, in selection order.
    pub selections: Vec<MaterialSelection>,
    /// Extra upgrade chance for this attempt only.
    pub bonus_upgrade: f64,
}

impl CraftRequest {
    /// Creates a request with no selections.
    #[must_use]
    pub fn new(user: UserId, template: TemplateId, slot: EquipSlot, subtype: impl Into<String>) -> Self {
        Self {
            user,
            template,
            slot,
            subtype: subtype.into(),
            selections: Vec::new(),
            bonus_upgrade: 0.0,
        }
    }

    /// Add a material selection.
    #[must_use]
    pub fn with_selection(mut self, selection: MaterialSelection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Set the per-attempt upgrade bonus.
    #[must_use]
    pub fn with_bonus(mut self, bonus: f64) -> Self {
        self.bonus_upgrade = bonus;
        self
    }
}

/// Result category of an executed roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CraftOutcome {
    /// Materials lost, no item.
    Failure,
    /// Item at the rarity ceiling.
    Normal,
    /// Item one rarity above the ceiling. Never rolled at the top tier.
    Upgrade,
}

/// What a craft would produce, with its odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTable {
    /// Per-stat chance of being the first line rolled.
    pub stat_probabilities: Vec<(StatKey, f64)>,
    /// Rarity of a normal result.
    pub rarity: Rarity,
    /// Rarity of an upgraded result.
    pub upgrade_rarity: Rarity,
    /// Element of the result.
    pub element: Option<Element>,
    /// Tier of the result.
    pub tier: u32,
    /// Outcome odds including pity and bonuses.
    pub odds: OutcomeOdds,
    /// Caller's pity counter for this table.
    pub pity: u32,
    /// Pity ledger key.
    pub table_key: String,
}

/// Result of an executed craft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftResult {
    /// Rolled outcome.
    pub outcome: CraftOutcome,
    /// Item produced on normal and upgrade outcomes.
    pub produced_item: Option<EquipmentItem>,
    /// Pity counter before the roll.
    pub pity_before: u32,
    /// Pity counter after the roll.
    pub pity_after: u32,
    /// Materials removed from the inventory.
    pub consumed: Vec<MaterialSelection>,
    /// Pity ledger key.
    pub table_key: String,
}

/// Pity ledger key for a slot and rarity ceiling.
#[must_use]
pub fn table_key(slot: EquipSlot, rarity: Rarity) -> String {
    format!("{}:{}", slot.key(), rarity.name().to_lowercase())
}

// ============================================================================
// Engine
// ============================================================================

/// Turns materials into equipment.
pub struct CraftingEngine {
    config: CraftingConfig,
    ledger: Arc<dyn PityLedger>,
}

impl std::fmt::Debug for CraftingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraftingEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CraftingEngine {
    /// Creates an engine with an in-memory pity ledger.
    #[must_use]
    pub fn new(config: CraftingConfig) -> Self {
        Self::with_ledger(config, Arc::new(InMemoryPityLedger::new()))
    }

    /// Creates an engine backed by a shared pity ledger.
    #[must_use]
    pub fn with_ledger(config: CraftingConfig, ledger: Arc<dyn PityLedger>) -> Self {
        Self { config, ledger }
    }

    /// Get the config.
    #[must_use]
    pub fn config(&self) -> &CraftingConfig {
        &self.config
    }

    /// Validates the request and reports what it would produce.
    ///
    /// Reads pity but never changes it.
    pub fn preview(&self, request: &CraftRequest, inventory: &MaterialInventory) -> CraftingResult<OutcomeTable> {
        let table = build_bps_table(&request.selections, inventory)?;
        let weights = validate_bps_table(&table)?;
        let total: f64 = weights.iter().map(|(_, w)| w).sum();

        let key = table_key(request.slot, table.rarity_ceiling);
        let pity = self.ledger.get(request.user, &key);
        let bonus = self.config.bonus_upgrade + request.bonus_upgrade.max(0.0);
        let odds = self.config.pity.odds(pity, bonus);

        Ok(OutcomeTable {
            stat_probabilities: weights.into_iter().map(|(k, w)| (k, w / total)).collect(),
            rarity: table.rarity_ceiling,
            upgrade_rarity: table.rarity_ceiling.next().unwrap_or(table.rarity_ceiling),
            element: table.element,
            tier: table.tier,
            odds,
            pity,
            table_key: key,
        })
    }

    /// Runs one craft.
    ///
    /// Validation errors leave `inventory` and pity untouched. Every executed
    /// roll consumes the selected materials, including failures.
    pub fn execute<R: RollSource>(
        &self,
        request: &CraftRequest,
        inventory: &mut MaterialInventory,
        rolls: &mut R,
    ) -> CraftingResult<CraftResult> {
        let table = self.preview(request, inventory)?;

        let roll = rolls.roll();
        let outcome = if roll < table.odds.failure {
            CraftOutcome::Failure
        } else if roll < table.odds.failure + table.odds.normal || table.upgrade_rarity <= table.rarity {
            // Nothing above the top tier: an upgrade roll there is a normal craft
            CraftOutcome::Normal
        } else {
            CraftOutcome::Upgrade
        };
        debug!(
            "Craft roll {:.4} against {:?} at pity {} -> {:?}",
            roll, table.odds, table.pity, outcome
        );

        let produced_item = match outcome {
            CraftOutcome::Failure => None,
            CraftOutcome::Normal => Some(self.produce(request, &table, table.rarity, rolls)?),
            CraftOutcome::Upgrade => Some(self.produce(request, &table, table.upgrade_rarity, rolls)?),
        };

        let consumed = merge_selections(&request.selections);
        let mut remaining = inventory.clone();
        for selection in &consumed {
            remaining.remove(selection.template, selection.rarity, selection.quantity)?;
        }
        *inventory = remaining;

        let pity_after = self
            .ledger
            .record(request.user, &table.table_key, outcome == CraftOutcome::Upgrade);

        info!(
            "User {:?} crafted {} -> {:?} (pity {} -> {})",
            request.user, table.table_key, outcome, table.pity, pity_after
        );

        Ok(CraftResult {
            outcome,
            produced_item,
            pity_before: table.pity,
            pity_after,
            consumed,
            table_key: table.table_key,
        })
    }

    /// Rolls stat lines without replacement and generates the item.
    fn produce<R: RollSource>(
        &self,
        request: &CraftRequest,
        table: &OutcomeTable,
        rarity: Rarity,
        rolls: &mut R,
    ) -> CraftingResult<EquipmentItem> {
        let mut weights: Vec<f64> = table.stat_probabilities.iter().map(|(_, p)| *p).collect();
        let mut template = EquipmentTemplate::new(request.template, request.slot, request.subtype.clone())
            .with_level_required(table.tier);

        for _ in 0..rarity.stat_lines() {
            let Some(index) = rolls.pick_weighted(&weights) else {
                break;
            };
            weights[index] = 0.0;
            let key = table.stat_probabilities[index].0;
            template = template.with_stat(key, key.base_line_value());
        }

        Ok(template.generate(rarity, table.tier, table.element)?)
    }
}

/// Sums selections of the same stack, preserving first-seen order.
fn merge_selections(selections: &[MaterialSelection]) -> Vec<MaterialSelection> {
    let mut order: Vec<(TemplateId, Rarity)> = Vec::new();
    let mut totals: BTreeMap<(TemplateId, Rarity), u32> = BTreeMap::new();
    for selection in selections.iter().filter(|s| s.quantity > 0) {
        let key = (selection.template, selection.rarity);
        let total = totals.entry(key).or_insert_with(|| {
            order.push(key);
            0
        });
        *total += selection.quantity;
    }
    order
        .into_iter()
        .map(|(template, rarity)| MaterialSelection::new(template, rarity, totals[&(template, rarity)]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CraftingError;
    use crate::material::Material;
    use cultivation_common::{EligibilityError, InvalidRecipeError, ScriptedRolls};
    use proptest::prelude::*;

    const JADE: TemplateId = TemplateId::new(1);
    const SHELL: TemplateId = TemplateId::new(2);

    fn inventory() -> MaterialInventory {
        let mut inv = MaterialInventory::new();
        inv.add(
            Material::new(JADE, "Fire Jade", Rarity::Rare, 50)
                .with_tier(2)
                .with_element(Element::Fire)
                .with_tag("attack")
                .with_tag("crit_rate"),
        );
        inv.add(
            Material::new(SHELL, "Turtle Shell", Rarity::Common, 50)
                .with_tag("defense")
                .with_tag("max_health"),
        );
        inv
    }

    fn request() -> CraftRequest {
        CraftRequest::new(UserId::new(1), TemplateId::new(900), EquipSlot::Weapon, "flying sword")
            .with_selection(MaterialSelection::new(JADE, Rarity::Rare, 2))
            .with_selection(MaterialSelection::new(SHELL, Rarity::Common, 1))
    }

    #[test]
    fn test_preview_reports_table_and_odds() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let table = engine.preview(&request(), &inventory()).expect("valid");

        assert_eq!(table.rarity, Rarity::Rare);
        assert_eq!(table.upgrade_rarity, Rarity::Epic);
        assert_eq!(table.element, Some(Element::Fire));
        assert_eq!(table.table_key, "weapon:rare");
        assert_eq!(table.pity, 0);
        let sum: f64 = table.stat_probabilities.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((table.odds.failure - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_normal_outcome_consumes_and_produces() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        let result = engine
            .execute(&request(), &mut inv, &mut ScriptedRolls::always(0.5))
            .expect("valid");

        assert_eq!(result.outcome, CraftOutcome::Normal);
        assert_eq!(result.pity_after, 1);
        assert_eq!(inv.count(JADE, Rarity::Rare), 48);
        assert_eq!(inv.count(SHELL, Rarity::Common), 49);

        let item = result.produced_item.expect("normal produces an item");
        assert_eq!(item.rarity, Rarity::Rare);
        assert_eq!(item.slot, EquipSlot::Weapon);
        assert_eq!(item.element, Some(Element::Fire));
        // Rare rolls two lines, plus the elemental line.
        assert_eq!(item.stats.len(), 3);
    }

    #[test]
    fn test_failure_still_consumes() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        let result = engine
            .execute(&request(), &mut inv, &mut ScriptedRolls::always(0.0))
            .expect("valid");

        assert_eq!(result.outcome, CraftOutcome::Failure);
        assert!(result.produced_item.is_none());
        assert_eq!(inv.count(JADE, Rarity::Rare), 48);
        assert_eq!(result.consumed.len(), 2);
    }

    #[test]
    fn test_upgrade_resets_pity() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        engine
            .execute(&request(), &mut inv, &mut ScriptedRolls::always(0.5))
            .expect("valid");
        let result = engine
            .execute(&request(), &mut inv, &mut ScriptedRolls::always(0.99))
            .expect("valid");

        assert_eq!(result.outcome, CraftOutcome::Upgrade);
        assert_eq!(result.pity_before, 1);
        assert_eq!(result.pity_after, 0);
        assert_eq!(result.produced_item.expect("item").rarity, Rarity::Epic);
    }

    #[test]
    fn test_top_tier_upgrade_roll_keeps_pity() {
        const PEARL: TemplateId = TemplateId::new(3);
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = MaterialInventory::new();
        inv.add(Material::new(PEARL, "Dragon Pearl", Rarity::Mythic, 10).with_tag("attack"));
        let request = CraftRequest::new(UserId::new(1), TemplateId::new(900), EquipSlot::Weapon, "flying sword")
            .with_selection(MaterialSelection::new(PEARL, Rarity::Mythic, 1));

        let table = engine.preview(&request, &inv).expect("valid");
        assert_eq!(table.upgrade_rarity, Rarity::Mythic);

        for expected_pity in 1..=2 {
            let result = engine
                .execute(&request, &mut inv, &mut ScriptedRolls::always(0.99))
                .expect("valid");
            assert_eq!(result.outcome, CraftOutcome::Normal);
            assert_eq!(result.pity_after, expected_pity);
            assert_eq!(result.produced_item.expect("item").rarity, Rarity::Mythic);
        }
    }

    #[test]
    fn test_zero_materials_leaves_inventory_unchanged() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        let before = inv.clone();
        let empty = CraftRequest::new(UserId::new(1), TemplateId::new(900), EquipSlot::Ring, "ring")
            .with_selection(MaterialSelection::new(JADE, Rarity::Rare, 0));
        let mut rolls = ScriptedRolls::always(0.5);

        let err = engine.execute(&empty, &mut inv, &mut rolls).unwrap_err();
        assert_eq!(err, CraftingError::Recipe(InvalidRecipeError::NoMaterials));
        assert_eq!(inv, before);
        assert_eq!(rolls.consumed(), 0);
    }

    #[test]
    fn test_unknown_stat_tag_rejected_before_roll() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = MaterialInventory::new();
        inv.add(Material::new(TemplateId::new(3), "Odd Dust", Rarity::Common, 5).with_tag("luck"));
        let before = inv.clone();
        let req = CraftRequest::new(UserId::new(1), TemplateId::new(900), EquipSlot::Belt, "belt")
            .with_selection(MaterialSelection::new(TemplateId::new(3), Rarity::Common, 1));
        let mut rolls = ScriptedRolls::always(0.5);

        let err = engine.execute(&req, &mut inv, &mut rolls).unwrap_err();
        assert_eq!(err, CraftingError::Recipe(InvalidRecipeError::UnknownStat("luck".to_string())));
        assert_eq!(inv, before);
        assert_eq!(rolls.consumed(), 0);
        assert_eq!(engine.ledger.get(UserId::new(1), "belt:common"), 0);
    }

    #[test]
    fn test_insufficient_material() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        let before = inv.clone();
        let greedy = request().with_selection(MaterialSelection::new(SHELL, Rarity::Common, 60));

        let err = engine
            .execute(&greedy, &mut inv, &mut ScriptedRolls::always(0.5))
            .unwrap_err();
        assert!(matches!(
            err,
            CraftingError::Eligibility(EligibilityError::InsufficientMaterial { needed: 61, have: 50, .. })
        ));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_bonus_modifiers_raise_upgrade_odds() {
        let config = CraftingConfig {
            bonus_upgrade: 0.1,
            ..CraftingConfig::default()
        };
        let engine = CraftingEngine::new(config);
        let table = engine
            .preview(&request().with_bonus(0.2), &inventory())
            .expect("valid");
        assert!((table.odds.upgrade - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_merge_selections_keeps_first_seen_order() {
        let merged = merge_selections(&[
            MaterialSelection::new(SHELL, Rarity::Common, 1),
            MaterialSelection::new(JADE, Rarity::Rare, 2),
            MaterialSelection::new(SHELL, Rarity::Common, 3),
        ]);
        assert_eq!(
            merged,
            vec![
                MaterialSelection::new(SHELL, Rarity::Common, 4),
                MaterialSelection::new(JADE, Rarity::Rare, 2),
            ]
        );
    }

    #[test]
    fn test_pity_guarantees_upgrade_at_threshold() {
        let engine = CraftingEngine::new(CraftingConfig::default());
        let mut inv = inventory();
        // A roll of zero fails whenever failure is possible.
        let mut rolls = ScriptedRolls::always(0.0);
        for expected in 1..=10 {
            let result = engine.execute(&request(), &mut inv, &mut rolls).expect("valid");
            assert_eq!(result.outcome, CraftOutcome::Failure);
            assert_eq!(result.pity_after, expected);
        }
        let result = engine.execute(&request(), &mut inv, &mut rolls).expect("valid");
        assert_eq!(result.outcome, CraftOutcome::Upgrade);
        assert_eq!(result.pity_after, 0);
    }

    proptest! {
        #[test]
        fn prop_pity_bounds_attempts_to_upgrade(rolls in proptest::collection::vec(0.0f64..1.0, 11)) {
            let engine = CraftingEngine::new(CraftingConfig::default());
            let mut inv = inventory();
            let mut source = ScriptedRolls::new(rolls).with_fallback(0.0);
            let mut upgraded = false;
            for _ in 0..=engine.config().pity.threshold {
                let result = engine.execute(&request(), &mut inv, &mut source).expect("valid");
                if result.outcome == CraftOutcome::Upgrade {
                    upgraded = true;
                    break;
                }
            }
            prop_assert!(upgraded);
        }
    }
}
