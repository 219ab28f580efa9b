//! Encounter orchestration.
//!
//! Ties a battle to its persistent side effects: stats come from the stored
//! record, and a win feeds drops, experience and quest progress back into it.
//! Equipment wears on every fight.

use crate::content::ContentRegistry;
use anyhow::{Context, Result};
use cultivation_combat::{
    BattleConfig, BattleEngine, BattleOptions, BattleOutcome, Combatant, EquipSlot, ModifierAggregator,
};
use cultivation_common::{CombatantId, CultivationError, ItemId, SeededRolls, SkillId, TemplateId, UserId};
use cultivation_crafting::{CraftRequest, CraftResult, CraftingEngine, Material, MaterialSelection};
use cultivation_progression::{ExperienceGrant, ProgressionService, QuestAction, QuestUpdate};
use serde::Serialize;
use tracing::{info, warn};

/// Combatant ID of the challenger.
const PLAYER_ID: CombatantId = CombatantId::new(1);
/// Combatant ID of the monster.
const ENEMY_ID: CombatantId = CombatantId::new(2);

/// One fight to run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterPlan {
    /// Challenger.
    pub user: UserId,
    /// Monster to fight.
    pub monster: u32,
    /// Skills the challenger brings.
    pub skills: Vec<SkillId>,
    /// Seed for the battle; drops use the next seed.
    pub seed: Option<u64>,
}

impl EncounterPlan {
    /// Creates an unseeded plan with no skills.
    #[must_use]
    pub fn new(user: UserId, monster: u32) -> Self {
        Self {
            user,
            monster,
            skills: Vec::new(),
            seed: None,
        }
    }

    /// Set skills.
    #[must_use]
    pub fn with_skills(mut self, skills: impl IntoIterator<Item = SkillId>) -> Self {
        self.skills = skills.into_iter().collect();
        self
    }

    /// Set seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Everything an encounter changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterReport {
    /// Challenger.
    pub user: UserId,
    /// Monster name.
    pub monster: String,
    /// Battle result and round log.
    pub outcome: BattleOutcome,
    /// Materials added to the inventory.
    pub drops: Vec<Material>,
    /// Experience applied, if any.
    pub experience: Option<ExperienceGrant>,
    /// Why experience was withheld, if it was.
    pub experience_rejected: Option<String>,
    /// Quest progress from the win.
    pub quests: QuestUpdate,
    /// Items that broke from wear.
    pub broken_items: Vec<ItemId>,
}

/// Runs encounters against a progression service.
#[derive(Debug)]
pub struct EncounterRunner<'a> {
    progression: &'a ProgressionService,
    aggregator: ModifierAggregator,
    battle: BattleEngine,
}

impl<'a> EncounterRunner<'a> {
    /// Creates a runner.
    #[must_use]
    pub fn new(progression: &'a ProgressionService, aggregator: ModifierAggregator, battle: BattleConfig) -> Self {
        Self {
            progression,
            aggregator,
            battle: BattleEngine::with_config(battle),
        }
    }

    /// Builds the challenger from the stored record.
    pub fn build_player(&self, content: &ContentRegistry, plan: &EncounterPlan) -> Result<Combatant> {
        let stats = self
            .progression
            .combat_stats(plan.user, &self.aggregator)
            .with_context(|| format!("resolving stats for {}", plan.user))?;
        let skills = content.skills_for(&plan.user.to_string(), &plan.skills)?;
        Ok(Combatant::new(PLAYER_ID, plan.user.to_string(), stats).with_skills(skills))
    }

    /// Runs one encounter and applies its rewards.
    ///
    /// A rejected experience grant is reported, not raised; the rest of the
    /// rewards still apply.
    pub fn run_encounter(&self, content: &ContentRegistry, plan: &EncounterPlan) -> Result<EncounterReport> {
        let user = plan.user;
        let monster = content
            .monster(plan.monster)
            .with_context(|| format!("monster {} is not loaded", plan.monster))?;

        let player = self.build_player(content, plan)?;
        let enemy = content.build_monster(plan.monster, ENEMY_ID)?;

        let mut options = BattleOptions::new();
        if let Some(seed) = plan.seed {
            options = options.with_seed(seed);
        }
        let outcome = self.battle.simulate(player, enemy, &options)?;

        let mut drops = Vec::new();
        let mut experience = None;
        let mut experience_rejected = None;
        let mut quests = QuestUpdate::default();

        if outcome.player_won() {
            let mut rolls = SeededRolls::from_option(plan.seed.map(|s| s.wrapping_add(1)));
            drops = content.loot().roll_drops(&outcome.loot, &mut rolls);
            if !drops.is_empty() {
                self.progression.add_materials(user, &drops)?;
            }

            if monster.exp_reward > 0 {
                match self.progression.grant_experience(user, monster.exp_reward) {
                    Ok(grant) => experience = Some(grant),
                    Err(CultivationError::RateLimited(e)) => {
                        warn!("{} earned no experience from {}: {}", user, monster.name, e);
                        experience_rejected = Some(e.to_string());
                    },
                    Err(e) => return Err(e.into()),
                }
            }

            quests = self.progression.apply_quest_progress(user, QuestAction::DefeatMonster, 1)?;
        }

        let broken_items = self.progression.apply_battle_wear(user, !outcome.player_won())?;

        info!(
            "{} vs {}: {:?} after {} rounds, {} drops",
            user,
            monster.name,
            outcome.winner,
            outcome.rounds_elapsed,
            drops.len()
        );

        Ok(EncounterReport {
            user,
            monster: monster.name.clone(),
            outcome,
            drops,
            experience,
            experience_rejected,
            quests,
            broken_items,
        })
    }
}

/// Template stamped on items forged from loot.
const FORGED_TEMPLATE: TemplateId = TemplateId::new(1000);

/// Crafts a `slot` item from every material stack the user owns.
///
/// Returns `None` when the user has nothing to craft with.
pub fn craft_from_inventory(
    progression: &ProgressionService,
    engine: &CraftingEngine,
    user: UserId,
    slot: EquipSlot,
    seed: Option<u64>,
) -> Result<Option<CraftResult>> {
    let record = progression.load(user)?;
    let mut request = CraftRequest::new(user, FORGED_TEMPLATE, slot, "forged");
    for stack in record.value.materials.iter() {
        request = request.with_selection(MaterialSelection::new(stack.template, stack.rarity, stack.quantity));
    }
    if request.selections.is_empty() {
        return Ok(None);
    }

    let mut rolls = SeededRolls::from_option(seed);
    let result = progression.craft(user, engine, &request, &mut rolls)?;
    if result.produced_item.is_some() {
        progression.apply_quest_progress(user, QuestAction::Craft, 1)?;
    }
    Ok(Some(result))
}
