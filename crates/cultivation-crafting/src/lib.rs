//! # Cultivation Crafting
//!
//! Turns materials into equipment.
//!
//! This crate provides:
//! - Materials and the stacked material inventory
//! - Base-points (BPS) tables built from material selections
//! - Pity counters and the outcome odds they bias
//! - The crafting engine (`preview` and `execute`)
//! - Loot tables converting battle loot hooks into materials

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod bps;
pub mod crafting;
pub mod drops;
pub mod error;
pub mod material;
pub mod pity;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bps::*;
    pub use crate::crafting::*;
    pub use crate::drops::*;
    pub use crate::error::*;
    pub use crate::material::*;
    pub use crate::pity::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_combat::{CultivatorProfile, EquipSlot};
    use cultivation_common::{Rarity, ScriptedRolls, TemplateId, UserId};

    #[test]
    fn test_loot_to_equipped_item() {
        let loot = LootTable::new().with_entry(
            "ore_golem",
            DropEntry::new(
                Material::new(TemplateId::new(5), "Golem Core", Rarity::Common, 0)
                    .with_tier(1)
                    .with_tag("defense"),
                1.0,
            )
            .with_quantity(4, 4),
        );
        let mut inventory = MaterialInventory::new();
        for drop in loot.roll_drops(&["ore_golem".to_string()], &mut ScriptedRolls::always(0.0)) {
            inventory.add(drop);
        }
        assert_eq!(inventory.count(TemplateId::new(5), Rarity::Common), 4);

        let engine = CraftingEngine::new(CraftingConfig::default());
        let request = CraftRequest::new(UserId::new(3), TemplateId::new(70), EquipSlot::Armor, "stone robe")
            .with_selection(MaterialSelection::new(TemplateId::new(5), Rarity::Common, 4));
        let result = engine
            .execute(&request, &mut inventory, &mut ScriptedRolls::always(0.5))
            .expect("valid craft");
        assert!(inventory.is_empty());

        let item = result.produced_item.expect("normal outcome");
        let id = item.id;
        let mut profile = CultivatorProfile::new(1, 1);
        profile.equipment.add(item);
        profile.equipment.equip(id, 1).expect("tier 1 item fits realm 1");
        assert_eq!(profile.equipment.equipped().count(), 1);
    }
}
