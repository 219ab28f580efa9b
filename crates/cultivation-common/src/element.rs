//! Five-phase elements and the overcoming cycle.

use serde::{Deserialize, Serialize};

/// Damage multiplier against the element this one overcomes.
pub const ELEMENT_ADVANTAGE: f64 = 1.3;

/// Damage multiplier against the element that overcomes this one.
pub const ELEMENT_DISADVANTAGE: f64 = 0.7;

/// The five phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    /// Metal.
    Metal,
    /// Wood.
    Wood,
    /// Water.
    Water,
    /// Fire.
    Fire,
    /// Earth.
    Earth,
}

impl Element {
    /// All elements.
    pub const ALL: [Self; 5] = [
        Self::Metal,
        Self::Wood,
        Self::Water,
        Self::Fire,
        Self::Earth,
    ];

    /// The element this one overcomes (metal cuts wood, wood parts earth,
    /// earth dams water, water quenches fire, fire melts metal).
    #[must_use]
    pub const fn overcomes(self) -> Self {
        match self {
            Self::Metal => Self::Wood,
            Self::Wood => Self::Earth,
            Self::Earth => Self::Water,
            Self::Water => Self::Fire,
            Self::Fire => Self::Metal,
        }
    }

    /// Damage multiplier for `self` damage landing on a `target` aligned combatant.
    #[must_use]
    pub fn matchup(self, target: Option<Element>) -> f64 {
        match target {
            Some(t) if self.overcomes() == t => ELEMENT_ADVANTAGE,
            Some(t) if t.overcomes() == self => ELEMENT_DISADVANTAGE,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_is_closed() {
        let mut e = Element::Metal;
        for _ in 0..5 {
            e = e.overcomes();
        }
        assert_eq!(e, Element::Metal);
    }

    #[test]
    fn test_matchups() {
        assert_eq!(Element::Water.matchup(Some(Element::Fire)), ELEMENT_ADVANTAGE);
        assert_eq!(Element::Fire.matchup(Some(Element::Water)), ELEMENT_DISADVANTAGE);
        assert_eq!(Element::Fire.matchup(Some(Element::Wood)), 1.0);
        assert_eq!(Element::Fire.matchup(None), 1.0);
    }
}
