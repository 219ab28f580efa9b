//! Crafting materials and the material inventory.

use cultivation_common::{EligibilityError, Element, Rarity, TemplateId};
use serde::{Deserialize, Serialize};

/// A stack of one material at one rarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material template.
    pub template: TemplateId,
    /// Display name.
    pub name: String,
    /// Tier (at least 1).
    pub tier: u32,
    /// Rarity.
    pub rarity: Rarity,
    /// Elemental affinity.
    pub element: Option<Element>,
    /// Names of the stats this material feeds.
    pub stat_tags: Vec<String>,
    /// Owned quantity.
    pub quantity: u32,
}

impl Material {
    /// Creates a stack of `quantity` tier-1 materials with no tags.
    #[must_use]
    pub fn new(template: TemplateId, name: impl Into<String>, rarity: Rarity, quantity: u32) -> Self {
        Self {
            template,
            name: name.into(),
            tier: 1,
            rarity,
            element: None,
            stat_tags: Vec::new(),
            quantity,
        }
    }

    /// Set tier.
    #[must_use]
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier.max(1);
        self
    }

    /// Set element.
    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = Some(element);
        self
    }

    /// Add a stat tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.stat_tags.push(tag.into());
        self
    }

    /// Stacking key.
    #[must_use]
    pub fn key(&self) -> (TemplateId, Rarity) {
        (self.template, self.rarity)
    }

    /// Base points one unit contributes: `tier × rarity weight`.
    #[must_use]
    pub fn unit_points(&self) -> f64 {
        f64::from(self.tier) * f64::from(self.rarity.craft_weight())
    }
}

/// A material chosen for a craft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSelection {
    /// Material template.
    pub template: TemplateId,
    /// Rarity of the stack.
    pub rarity: Rarity,
    /// Units to use.
    pub quantity: u32,
}

impl MaterialSelection {
    /// Creates a selection.
    #[must_use]
    pub const fn new(template: TemplateId, rarity: Rarity, quantity: u32) -> Self {
        Self {
            template,
            rarity,
            quantity,
        }
    }
}

/// Owned materials, one stack per (template, rarity).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialInventory {
    stacks: Vec<Material>,
}

impl MaterialInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Adds a stack, merging into an existing one with the same key.
    pub fn add(&mut self, material: Material) {
        if material.quantity == 0 {
            return;
        }
        match self.stacks.iter_mut().find(|m| m.key() == material.key()) {
            Some(stack) => stack.quantity = stack.quantity.saturating_add(material.quantity),
            None => self.stacks.push(material),
        }
    }

    /// Returns the stack for a key.
    #[must_use]
    pub fn get(&self, template: TemplateId, rarity: Rarity) -> Option<&Material> {
        self.stacks.iter().find(|m| m.key() == (template, rarity))
    }

    /// Owned quantity for a key.
    #[must_use]
    pub fn count(&self, template: TemplateId, rarity: Rarity) -> u32 {
        self.get(template, rarity).map_or(0, |m| m.quantity)
    }

    /// Checks if at least `amount` is owned.
    #[must_use]
    pub fn has(&self, template: TemplateId, rarity: Rarity, amount: u32) -> bool {
        self.count(template, rarity) >= amount
    }

    /// Removes units, dropping the stack when it empties.
    pub fn remove(&mut self, template: TemplateId, rarity: Rarity, amount: u32) -> Result<(), EligibilityError> {
        let have = self.count(template, rarity);
        if have < amount {
            return Err(EligibilityError::InsufficientMaterial {
                template,
                needed: amount,
                have,
            });
        }
        if let Some(stack) = self.stacks.iter_mut().find(|m| m.key() == (template, rarity)) {
            stack.quantity -= amount;
        }
        self.stacks.retain(|m| m.quantity > 0);
        Ok(())
    }

    /// Total units across all stacks.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.stacks.iter().map(|m| u64::from(m.quantity)).sum()
    }

    /// Returns an iterator over all stacks.
    pub fn iter(&self) -> impl Iterator<Item = &Material> + '_ {
        self.stacks.iter()
    }
}
