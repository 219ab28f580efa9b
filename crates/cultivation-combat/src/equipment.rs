//! Equipment items, templates and the equipment inventory.
//!
//! Items are generated from read-only templates, scale exponentially with
//! tier, and lose effectiveness as durability drops. The inventory owns
//! every item; the loadout is the subset flagged as equipped, at most one per
//! slot.

use crate::stats::StatBlock;
use cultivation_common::{
    ConfigurationError, EligibilityError, Element, ItemId, Rarity, StatKey, TemplateId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stat growth per tier above 1.
pub const TIER_GROWTH: f64 = 1.35;

/// Stat gain per enhance level.
pub const ENHANCE_STEP: f64 = 0.05;

/// Highest enhance level.
pub const MAX_ENHANCE_LEVEL: u32 = 15;

/// Durability of a tier 1 item.
pub const BASE_DURABILITY: u32 = 100;

/// Extra durability per tier above 1.
pub const DURABILITY_PER_TIER: u32 = 20;

// ============================================================================
// Slots & Durability
// ============================================================================

/// Equipment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    /// Sword, saber, fan...
    Weapon,
    /// Robe or armor.
    Armor,
    /// Crown or helmet.
    Helmet,
    /// Boots.
    Boots,
    /// Belt.
    Belt,
    /// Ring.
    Ring,
    /// Amulet.
    Amulet,
    /// Talisman.
    Talisman,
}

impl EquipSlot {
    /// All slots.
    pub const ALL: [Self; 8] = [
        Self::Weapon,
        Self::Armor,
        Self::Helmet,
        Self::Boots,
        Self::Belt,
        Self::Ring,
        Self::Amulet,
        Self::Talisman,
    ];

    /// Lowercase slot name, used in craft-table keys.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Helmet => "helmet",
            Self::Boots => "boots",
            Self::Belt => "belt",
            Self::Ring => "ring",
            Self::Amulet => "amulet",
            Self::Talisman => "talisman",
        }
    }
}

/// Item durability. Invariant: `current <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durability {
    current: u32,
    max: u32,
}

impl Durability {
    /// Full durability.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Partially worn durability; `current` is clamped to `max`.
    #[must_use]
    pub fn with_current(max: u32, current: u32) -> Self {
        Self {
            current: current.min(max),
            max,
        }
    }

    /// Current durability.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Maximum durability.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// `current / max`, zero for items without durability.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.current) / f64::from(self.max)
        }
    }

    /// Effectiveness multiplier: the ratio clamped to `[floor, 1]`.
    #[must_use]
    pub fn effectiveness(&self, floor: f64) -> f64 {
        self.ratio().clamp(floor, 1.0)
    }

    /// Check if fully broken.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.current == 0
    }

    /// Points missing from full.
    #[must_use]
    pub const fn missing(&self) -> u32 {
        self.max - self.current
    }

    /// Lose durability, saturating at zero.
    pub fn wear(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Restore to full.
    pub fn repair(&mut self) {
        self.current = self.max;
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Read-only reference data an item is generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentTemplate {
    /// Template identifier.
    pub id: TemplateId,
    /// Slot the item occupies.
    pub slot: EquipSlot,
    /// Subtype name (e.g. "flying sword").
    pub subtype: String,
    /// Stats at tier 1, common rarity.
    pub base_stats: StatBlock,
    /// Minimum realm to equip.
    pub level_required: u32,
}

impl EquipmentTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(id: TemplateId, slot: EquipSlot, subtype: impl Into<String>) -> Self {
        Self {
            id,
            slot,
            subtype: subtype.into(),
            base_stats: StatBlock::new(),
            level_required: 1,
        }
    }

    /// Adds a base stat.
    #[must_use]
    pub fn with_stat(mut self, key: StatKey, value: f64) -> Self {
        self.base_stats.add(key, value);
        self
    }

    /// Sets the realm requirement.
    #[must_use]
    pub const fn with_level_required(mut self, realm: u32) -> Self {
        self.level_required = realm;
        self
    }

    /// Generates an item of the given rarity, tier and element.
    pub fn generate(
        &self,
        rarity: Rarity,
        tier: u32,
        element: Option<Element>,
    ) -> Result<EquipmentItem, ConfigurationError> {
        if tier == 0 {
            return Err(ConfigurationError::InvalidItem {
                template: self.id,
                reason: "tier must be at least 1".to_string(),
            });
        }
        if let Some((key, value)) = self.base_stats.first_invalid() {
            return Err(ConfigurationError::InvalidItem {
                template: self.id,
                reason: format!("base stat {key} is {value}"),
            });
        }

        let factor = tier_scale(tier) * rarity.stat_multiplier();
        let mut stats = self.base_stats.scaled(factor);
        if let Some(element) = element {
            stats.add(
                StatKey::for_element(element),
                StatKey::for_element(element).base_line_value() * factor,
            );
        }

        Ok(EquipmentItem {
            id: ItemId::generate(),
            template: self.id,
            slot: self.slot,
            subtype: self.subtype.clone(),
            rarity,
            tier,
            element,
            level_required: self.level_required,
            enhance_level: 0,
            stats,
            durability: Durability::new(durability_for_tier(tier)),
            equipped: false,
        })
    }
}

/// `TIER_GROWTH^(tier-1)`.
#[must_use]
pub fn tier_scale(tier: u32) -> f64 {
    TIER_GROWTH.powi(tier.max(1) as i32 - 1)
}

/// Max durability for a freshly generated item.
#[must_use]
pub const fn durability_for_tier(tier: u32) -> u32 {
    BASE_DURABILITY + DURABILITY_PER_TIER * tier.saturating_sub(1)
}

// ============================================================================
// Items
// ============================================================================

/// A concrete equipment item owned by a cultivator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
    /// Instance identifier.
    pub id: ItemId,
    /// Template this item was generated from.
    pub template: TemplateId,
    /// Slot the item occupies.
    pub slot: EquipSlot,
    /// Subtype name.
    pub subtype: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Tier (>= 1).
    pub tier: u32,
    /// Element tag.
    pub element: Option<Element>,
    /// Minimum realm to equip.
    pub level_required: u32,
    /// Enhance level.
    pub enhance_level: u32,
    /// Stat block; changes only through `enhance`.
    pub stats: StatBlock,
    /// Durability.
    pub durability: Durability,
    /// Whether the item is in the loadout.
    pub equipped: bool,
}

impl EquipmentItem {
    /// Stats after the durability penalty.
    #[must_use]
    pub fn effective_stats(&self, durability_floor: f64) -> StatBlock {
        self.stats.scaled(self.durability.effectiveness(durability_floor))
    }

    /// Rejects items with malformed stat blocks.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.tier == 0 {
            return Err(ConfigurationError::InvalidItem {
                template: self.template,
                reason: "tier must be at least 1".to_string(),
            });
        }
        if let Some((key, value)) = self.stats.first_invalid() {
            return Err(ConfigurationError::InvalidItem {
                template: self.template,
                reason: format!("stat {key} is {value}"),
            });
        }
        Ok(())
    }

    /// Spirit stones paid when selling.
    #[must_use]
    pub fn sell_price(&self) -> u64 {
        let base: u64 = match self.rarity {
            Rarity::Common => 10,
            Rarity::Uncommon => 30,
            Rarity::Rare => 100,
            Rarity::Epic => 400,
            Rarity::Legendary => 1_500,
            Rarity::Mythic => 6_000,
        };
        base * u64::from(self.tier) * u64::from(1 + self.enhance_level)
    }

    /// Spirit stones needed to restore full durability.
    #[must_use]
    pub fn repair_cost(&self) -> u64 {
        u64::from(self.durability.missing()) * u64::from(self.tier) * 2
    }
}

// ============================================================================
// Equipment Inventory
// ============================================================================

/// All equipment a cultivator owns; equipped items form the loadout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentInventory {
    items: Vec<EquipmentItem>,
}

impl EquipmentInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item, unequipped.
    pub fn add(&mut self, mut item: EquipmentItem) {
        item.equipped = false;
        self.items.push(item);
    }

    /// Number of items owned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an owned item.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&EquipmentItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut EquipmentItem, EligibilityError> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(EligibilityError::ItemNotOwned(id))
    }

    /// All owned items.
    pub fn iter(&self) -> impl Iterator<Item = &EquipmentItem> + '_ {
        self.items.iter()
    }

    /// Items currently in the loadout.
    pub fn equipped(&self) -> impl Iterator<Item = &EquipmentItem> + '_ {
        self.items.iter().filter(|i| i.equipped)
    }

    /// The item equipped in a slot.
    #[must_use]
    pub fn equipped_in(&self, slot: EquipSlot) -> Option<&EquipmentItem> {
        self.items.iter().find(|i| i.equipped && i.slot == slot)
    }

    /// Equips an owned item, enforcing the realm lock.
    ///
    /// Returns the item previously in that slot, which goes back to the
    /// inventory unequipped. Re-equipping the same item is a no-op.
    pub fn equip(&mut self, id: ItemId, realm: u32) -> Result<Option<ItemId>, EligibilityError> {
        let (slot, required) = {
            let item = self.get(id).ok_or(EligibilityError::ItemNotOwned(id))?;
            (item.slot, item.level_required)
        };
        if required > realm {
            return Err(EligibilityError::RealmLocked {
                required,
                current: realm,
            });
        }

        let previous = self.equipped_in(slot).map(|i| i.id);
        if previous == Some(id) {
            return Ok(None);
        }
        if let Some(prev) = previous {
            self.get_mut(prev)?.equipped = false;
        }
        self.get_mut(id)?.equipped = true;
        debug!("Equipped {:?} in {:?}, replaced {:?}", id, slot, previous);
        Ok(previous)
    }

    /// Unequips a slot, returning the item that was there.
    pub fn unequip(&mut self, slot: EquipSlot) -> Option<ItemId> {
        let item = self.items.iter_mut().find(|i| i.equipped && i.slot == slot)?;
        item.equipped = false;
        Some(item.id)
    }

    /// Sells an unequipped item, returning it with its price.
    pub fn sell(&mut self, id: ItemId) -> Result<(EquipmentItem, u64), EligibilityError> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(EligibilityError::ItemNotOwned(id))?;
        if self.items[index].equipped {
            return Err(EligibilityError::ItemEquipped(id));
        }
        let item = self.items.remove(index);
        let price = item.sell_price();
        Ok((item, price))
    }

    /// Restores an item to full durability, returning the cost.
    pub fn repair(&mut self, id: ItemId) -> Result<u64, EligibilityError> {
        let item = self.get_mut(id)?;
        let cost = item.repair_cost();
        item.durability.repair();
        Ok(cost)
    }

    /// Raises an item's enhance level by one, growing its stat block.
    pub fn enhance(&mut self, id: ItemId) -> Result<u32, EligibilityError> {
        let item = self.get_mut(id)?;
        if item.enhance_level >= MAX_ENHANCE_LEVEL {
            return Err(EligibilityError::MaxEnhancement(id));
        }
        let before = 1.0 + ENHANCE_STEP * f64::from(item.enhance_level);
        item.enhance_level += 1;
        let after = 1.0 + ENHANCE_STEP * f64::from(item.enhance_level);
        item.stats = item.stats.scaled(after / before);
        Ok(item.enhance_level)
    }

    /// Wears every equipped item after a battle: one point, two on defeat.
    ///
    /// Returns the items that are now fully broken.
    pub fn apply_battle_wear(&mut self, defeated: bool) -> Vec<ItemId> {
        let amount = if defeated { 2 } else { 1 };
        self.items
            .iter_mut()
            .filter(|i| i.equipped)
            .filter_map(|item| {
                item.durability.wear(amount);
                item.durability.is_broken().then_some(item.id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> EquipmentTemplate {
        EquipmentTemplate::new(TemplateId::new(1), EquipSlot::Weapon, "flying sword")
            .with_stat(StatKey::Attack, 40.0)
            .with_stat(StatKey::CritRate, 0.05)
    }

    #[test]
    fn test_generate_scales_by_tier_and_rarity() {
        let item = sword().generate(Rarity::Rare, 3, None).expect("valid template");
        let expected = 40.0 * TIER_GROWTH * TIER_GROWTH * 1.5;
        assert!((item.stats.get(StatKey::Attack) - expected).abs() < 1e-9);
        assert_eq!(item.durability.max(), 140);
        assert!(!item.equipped);
    }

    #[test]
    fn test_generate_adds_element_line() {
        let item = sword()
            .generate(Rarity::Common, 1, Some(Element::Fire))
            .expect("valid template");
        assert_eq!(item.stats.get(StatKey::ElementalFire), 10.0);
    }

    #[test]
    fn test_generate_rejects_tier_zero() {
        assert!(sword().generate(Rarity::Common, 0, None).is_err());
    }

    #[test]
    fn test_durability_effectiveness_floor() {
        let mut d = Durability::new(100);
        assert_eq!(d.effectiveness(0.25), 1.0);
        d.wear(60);
        assert!((d.effectiveness(0.25) - 0.4).abs() < 1e-9);
        d.wear(1000);
        assert!(d.is_broken());
        assert_eq!(d.effectiveness(0.25), 0.25);
        assert_eq!(Durability::new(0).effectiveness(0.25), 0.25);
        assert_eq!(Durability::with_current(10, 50).current(), 10);
    }

    #[test]
    fn test_equip_realm_lock() {
        let mut inv = EquipmentInventory::new();
        let item = sword()
            .with_level_required(3)
            .generate(Rarity::Common, 1, None)
            .expect("valid template");
        let id = item.id;
        inv.add(item);

        assert_eq!(
            inv.equip(id, 2),
            Err(EligibilityError::RealmLocked {
                required: 3,
                current: 2
            })
        );
        assert!(inv.equip(id, 3).is_ok());
        assert!(inv.equipped_in(EquipSlot::Weapon).is_some());
    }

    #[test]
    fn test_equip_replaces_previous_occupant() {
        let mut inv = EquipmentInventory::new();
        let a = sword().generate(Rarity::Common, 1, None).expect("valid");
        let b = sword().generate(Rarity::Rare, 1, None).expect("valid");
        let (a_id, b_id) = (a.id, b.id);
        inv.add(a);
        inv.add(b);

        assert_eq!(inv.equip(a_id, 1), Ok(None));
        assert_eq!(inv.equip(a_id, 1), Ok(None));
        assert_eq!(inv.equip(b_id, 1), Ok(Some(a_id)));
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.equipped().count(), 1);
        assert!(!inv.get(a_id).expect("still owned").equipped);
    }

    #[test]
    fn test_equip_unknown_item() {
        let mut inv = EquipmentInventory::new();
        let ghost = ItemId::from_raw(u64::MAX);
        assert_eq!(inv.equip(ghost, 9), Err(EligibilityError::ItemNotOwned(ghost)));
    }

    #[test]
    fn test_sell_equipped_rejected() {
        let mut inv = EquipmentInventory::new();
        let item = sword().generate(Rarity::Epic, 2, None).expect("valid");
        let id = item.id;
        inv.add(item);
        inv.equip(id, 1).expect("equip");
        assert_eq!(inv.sell(id), Err(EligibilityError::ItemEquipped(id)));

        inv.unequip(EquipSlot::Weapon);
        let (_, price) = inv.sell(id).expect("sell");
        assert_eq!(price, 800);
        assert!(inv.is_empty());
    }

    #[test]
    fn test_repair_and_wear() {
        let mut inv = EquipmentInventory::new();
        let item = sword().generate(Rarity::Common, 2, None).expect("valid");
        let id = item.id;
        inv.add(item);
        inv.equip(id, 1).expect("equip");

        assert!(inv.apply_battle_wear(true).is_empty());
        assert_eq!(inv.get(id).expect("owned").durability.current(), 118);
        assert_eq!(inv.repair(id), Ok(8));
        assert_eq!(inv.get(id).expect("owned").durability.current(), 120);
    }

    #[test]
    fn test_enhance_grows_stats() {
        let mut inv = EquipmentInventory::new();
        let item = sword().generate(Rarity::Common, 1, None).expect("valid");
        let id = item.id;
        inv.add(item);

        assert_eq!(inv.enhance(id), Ok(1));
        assert_eq!(inv.enhance(id), Ok(2));
        let attack = inv.get(id).expect("owned").stats.get(StatKey::Attack);
        assert!((attack - 44.0).abs() < 1e-9);

        for _ in 2..MAX_ENHANCE_LEVEL {
            inv.enhance(id).expect("below max");
        }
        assert_eq!(inv.enhance(id), Err(EligibilityError::MaxEnhancement(id)));
    }
}
