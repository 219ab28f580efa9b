//! Battle engine.
//!
//! Runs a full encounter between two combatants as a round-based state
//! machine. Each round both sides act in speed order; the encounter ends when
//! a side falls or the round cap is reached.

use crate::combatant::Combatant;
use crate::damage::{DamageCalculator, DamageInstance, TargetDefense, ARMOR_K};
use crate::effects::{self, EffectKind};
use crate::skills::{SkillDefinition, SkillResolver};
use crate::stats::StatCaps;
use cultivation_common::{CombatantId, ConfigurationError, RollSource, SeededRolls, SkillId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

// ============================================================================
// Configuration
// ============================================================================

/// Battle engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Rounds before the encounter times out.
    pub round_cap: u32,
    /// Armor constant for defense mitigation.
    pub armor_k: f64,
    /// Rate ceilings for working stats.
    pub caps: StatCaps,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            round_cap: 30,
            armor_k: ARMOR_K,
            caps: StatCaps::default(),
        }
    }
}

impl BattleConfig {
    /// Clamp settings to sensible ranges.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        self.round_cap = self.round_cap.clamp(1, 1000);
        if !self.armor_k.is_finite() || self.armor_k <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "armor constant must be positive, got {}",
                self.armor_k
            )));
        }
        self.caps.validate()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleOptions {
    /// Seed for reproducible runs. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Overrides the configured round cap.
    pub round_cap: Option<u32>,
}

impl BattleOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set round cap.
    #[must_use]
    pub const fn with_round_cap(mut self, cap: u32) -> Self {
        self.round_cap = Some(cap);
        self
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Which side of the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The challenger.
    Player,
    /// The opponent (monster, bot or boss).
    Enemy,
}

/// What happened when a combatant took its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Turn lost to a stun.
    Skipped,
    /// The hit roll failed.
    Missed,
    /// The action took effect.
    Resolved,
}

/// One action in the combat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    /// Acting combatant.
    pub actor: CombatantId,
    /// Target combatant.
    pub target: CombatantId,
    /// Skill used.
    pub skill: SkillId,
    /// Skill name.
    pub skill_name: String,
    /// Outcome category.
    pub kind: ActionKind,
    /// Whether the hit was critical.
    pub crit: bool,
    /// Health damage dealt to the target.
    pub damage: f64,
    /// Damage absorbed by the target's shields.
    pub shield_absorbed: f64,
    /// Damage reflected back to the actor.
    pub reflected: f64,
    /// Health restored to the actor.
    pub healing: f64,
    /// Effects applied by the action.
    pub effects: Vec<EffectKind>,
    /// Combatants whose fatal protection fired during the action.
    pub revived: Vec<CombatantId>,
}

impl ActionLog {
    fn new(actor: CombatantId, target: CombatantId, skill: &SkillDefinition, kind: ActionKind) -> Self {
        Self {
            actor,
            target,
            skill: skill.id,
            skill_name: skill.name.clone(),
            kind,
            crit: false,
            damage: 0.0,
            shield_absorbed: 0.0,
            reflected: 0.0,
            healing: 0.0,
            effects: Vec::new(),
            revived: Vec::new(),
        }
    }
}

/// Log of one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundLog {
    /// Round number, starting at 1.
    pub round: u32,
    /// Actions in turn order.
    pub actions: Vec<ActionLog>,
    /// Poison damage taken at round end.
    pub poison: Vec<(CombatantId, f64)>,
    /// Combatants revived by fatal protection at round end.
    pub revived: Vec<CombatantId>,
}

/// Result of a simulated encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Winning side.
    pub winner: Side,
    /// Winning combatant.
    pub winner_id: CombatantId,
    /// Per-round log.
    pub rounds: Vec<RoundLog>,
    /// Damage the player dealt (hits, reflects and poison).
    pub total_damage_dealt: f64,
    /// Damage the player took.
    pub total_damage_taken: f64,
    /// Rounds played.
    pub rounds_elapsed: u32,
    /// Whether the round cap ended the encounter.
    pub timed_out: bool,
    /// Player health at the end.
    pub player_health: f64,
    /// Enemy health at the end.
    pub enemy_health: f64,
    /// Loot hook keys of the defeated enemy (empty on defeat).
    pub loot: Vec<String>,
}

impl BattleOutcome {
    /// Check if the player won.
    #[must_use]
    pub fn player_won(&self) -> bool {
        self.winner == Side::Player
    }
}

// ============================================================================
// Battle Engine
// ============================================================================

/// Simulates encounters.
#[derive(Debug, Clone, Default)]
pub struct BattleEngine {
    /// Configuration.
    pub config: BattleConfig,
    resolver: SkillResolver,
    calculator: DamageCalculator,
}

impl BattleEngine {
    /// Create engine with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create engine with config.
    #[must_use]
    pub fn with_config(config: BattleConfig) -> Self {
        Self {
            resolver: SkillResolver::with_caps(config.caps.clone()),
            calculator: DamageCalculator::with_armor_k(config.armor_k),
            config,
        }
    }

    /// Simulates an encounter with rolls seeded from `options`.
    pub fn simulate(
        &self,
        player: Combatant,
        enemy: Combatant,
        options: &BattleOptions,
    ) -> Result<BattleOutcome, ConfigurationError> {
        let mut rolls = SeededRolls::from_option(options.seed);
        self.simulate_with(player, enemy, options, &mut rolls)
    }

    /// Simulates an encounter drawing from `rolls`.
    ///
    /// Malformed combatants fail before the first round; a malformed skill
    /// met mid-loop aborts the encounter with no partial outcome.
    pub fn simulate_with(
        &self,
        mut player: Combatant,
        mut enemy: Combatant,
        options: &BattleOptions,
        rolls: &mut impl RollSource,
    ) -> Result<BattleOutcome, ConfigurationError> {
        player.validate()?;
        enemy.validate()?;
        player.refresh_flags();
        enemy.refresh_flags();

        let cap = options.round_cap.unwrap_or(self.config.round_cap).max(1);
        let mut rounds = Vec::new();
        let mut dealt = 0.0;
        let mut taken = 0.0;
        let mut finished = false;

        for round in 1..=cap {
            let mut log = RoundLog {
                round,
                ..RoundLog::default()
            };

            for side in self.turn_order(&player, &enemy) {
                let (actor, target) = match side {
                    Side::Player => (&mut player, &mut enemy),
                    Side::Enemy => (&mut enemy, &mut player),
                };
                let action = self.resolve_action(actor, target, rolls)?;
                match side {
                    Side::Player => {
                        dealt += action.damage;
                        taken += action.reflected;
                    },
                    Side::Enemy => {
                        taken += action.damage;
                        dealt += action.reflected;
                    },
                }
                log.actions.push(action);
                if !player.is_alive() || !enemy.is_alive() {
                    finished = true;
                    break;
                }
            }

            if !finished {
                taken += self.end_round(&mut player, &mut log);
                dealt += self.end_round(&mut enemy, &mut log);
                finished = !player.is_alive() || !enemy.is_alive();
            }
            rounds.push(log);
            if finished {
                break;
            }
        }

        let rounds_elapsed = rounds.len() as u32;
        let timed_out = !finished;
        let winner = if timed_out {
            if player.health_fraction() > enemy.health_fraction() {
                Side::Player
            } else {
                Side::Enemy
            }
        } else if player.is_alive() && !enemy.is_alive() {
            Side::Player
        } else {
            Side::Enemy
        };

        let (winner_id, loot) = match winner {
            Side::Player => (player.id, enemy.loot_table.clone()),
            Side::Enemy => (enemy.id, Vec::new()),
        };

        info!(
            "Battle {} vs {}: {:?} won after {} round(s){}",
            player.name,
            enemy.name,
            winner,
            rounds_elapsed,
            if timed_out { " (timeout)" } else { "" }
        );

        Ok(BattleOutcome {
            winner,
            winner_id,
            rounds,
            total_damage_dealt: dealt,
            total_damage_taken: taken,
            rounds_elapsed,
            timed_out,
            player_health: player.health.max(0.0),
            enemy_health: enemy.health.max(0.0),
            loot,
        })
    }

    /// Higher working speed first; ties go to the lower combatant id.
    fn turn_order(&self, player: &Combatant, enemy: &Combatant) -> [Side; 2] {
        let player_speed = player.working_stats(&self.config.caps).speed;
        let enemy_speed = enemy.working_stats(&self.config.caps).speed;
        let player_first = match player_speed.partial_cmp(&enemy_speed) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            _ => player.id <= enemy.id,
        };
        if player_first {
            [Side::Player, Side::Enemy]
        } else {
            [Side::Enemy, Side::Player]
        }
    }

    /// Picks a ready skill by weight, falling back to the basic attack.
    fn select_skill(&self, actor: &Combatant, rolls: &mut impl RollSource) -> SkillDefinition {
        let ready = actor.ready_skills();
        if ready.is_empty() {
            return SkillDefinition::basic_attack();
        }
        let weights: Vec<f64> = ready.iter().map(|s| s.weight).collect();
        rolls
            .pick_weighted(&weights)
            .and_then(|i| ready.get(i))
            .map_or_else(SkillDefinition::basic_attack, |s| (*s).clone())
    }

    /// Resolves one turn of `actor` against `target`.
    pub fn resolve_action(
        &self,
        actor: &mut Combatant,
        target: &mut Combatant,
        rolls: &mut impl RollSource,
    ) -> Result<ActionLog, ConfigurationError> {
        if actor.is_stunned() {
            debug!("{} is stunned", actor.name);
            effects::spend_one_time(&mut actor.effects, true);
            actor.refresh_flags();
            return Ok(ActionLog::new(
                actor.id,
                target.id,
                &SkillDefinition::basic_attack(),
                ActionKind::Skipped,
            ));
        }

        let caps = &self.config.caps;
        let skill = self.select_skill(actor, rolls);
        let working = actor.working_stats(caps);
        let target_working = target.working_stats(caps);
        let ignore_defense = actor.ignores_defense();
        let damaging = skill.effect.is_damaging();
        let mut log = ActionLog::new(actor.id, target.id, &skill, ActionKind::Resolved);

        let mut crit = false;
        if damaging {
            let hit_chance = working.hit_rate - target_working.evasion;
            if !rolls.chance(hit_chance) {
                debug!("{} misses with {}", actor.name, skill.name);
                actor.start_cooldown(&skill);
                effects::spend_one_time(&mut actor.effects, true);
                actor.refresh_flags();
                log.kind = ActionKind::Missed;
                return Ok(log);
            }
            crit = rolls.chance(working.crit_rate);
        }

        let outcome = self.resolver.execute(&skill, actor, target, rolls)?;
        actor.spend_resource(outcome.resource_cost);
        actor.start_cooldown(&skill);
        effects::spend_one_time(&mut actor.effects, true);
        if outcome.cleanse {
            effects::cleanse(&mut actor.effects);
        }
        for buff in &outcome.buffs {
            actor.add_effect(buff.clone());
            log.effects.push(buff.kind);
        }

        if damaging {
            let elemental: f64 = working
                .elemental
                .iter()
                .map(|(element, value)| value * element.matchup(target.element))
                .sum();
            let mut hit = DamageInstance::new(outcome.damage)
                .with_elemental(elemental)
                .with_true_damage(working.true_damage)
                .with_penetration(working.penetration)
                .ignoring_defense(ignore_defense);
            if crit {
                hit = hit.as_crit(working.crit_damage);
            }
            let defense = TargetDefense {
                defense: target_working.defense,
                damage_reduction: target_working.damage_reduction,
                shield: target.shield_total(),
                reflect: target_working.reflect_damage,
                invulnerable: target.invulnerable,
            };
            let result = self.calculator.calculate(&hit, &defense);

            target.absorb_shield(result.shield_absorbed);
            if target.take_damage(result.final_damage) {
                log.revived.push(target.id);
            }
            if result.reflected > 0.0 && !actor.invulnerable && actor.take_damage(result.reflected) {
                log.revived.push(actor.id);
            }

            let steal = (working.lifesteal + outcome.lifesteal) * result.final_damage;
            log.healing += actor.heal(steal);

            if !result.was_immune {
                effects::spend_one_time(&mut target.effects, false);
                for debuff in &outcome.debuffs {
                    target.add_effect(debuff.clone());
                    log.effects.push(debuff.kind);
                }
            }
            target.refresh_flags();

            log.crit = result.was_crit;
            log.damage = result.final_damage;
            log.shield_absorbed = result.shield_absorbed;
            log.reflected = if actor.invulnerable { 0.0 } else { result.reflected };
        } else if !target.invulnerable {
            for debuff in &outcome.debuffs {
                target.add_effect(debuff.clone());
                log.effects.push(debuff.kind);
            }
        }

        log.healing += actor.heal(outcome.healing);
        actor.restore_resource(outcome.resource_restore);
        actor.refresh_flags();

        debug!(
            "{} -> {}: {} dealt {} (crit={}, shield={}, reflected={}), healed {}",
            actor.name,
            target.name,
            skill.name,
            log.damage,
            log.crit,
            log.shield_absorbed,
            log.reflected,
            log.healing
        );
        Ok(log)
    }

    /// Round-end upkeep for one combatant. Returns poison damage taken.
    fn end_round(&self, combatant: &mut Combatant, log: &mut RoundLog) -> f64 {
        let mut poisoned = 0.0;
        if combatant.is_alive() && !combatant.invulnerable {
            let poison: f64 = combatant
                .effects
                .iter()
                .filter(|e| e.kind == EffectKind::Poison)
                .map(|e| e.magnitude)
                .sum();
            if poison > 0.0 {
                poisoned = poison.floor();
                if combatant.take_damage(poisoned) {
                    log.revived.push(combatant.id);
                }
                log.poison.push((combatant.id, poisoned));
            }
        }

        effects::tick_durations(&mut combatant.effects);
        combatant.tick_cooldowns();
        if combatant.is_alive() {
            let regen = combatant.stats.resource_regen;
            combatant.restore_resource(regen);
        }
        combatant.refresh_flags();
        poisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{ActiveEffect, EffectSpec};
    use crate::realm::base_stats;
    use crate::skills::SkillEffect;
    use crate::stats::CombatStats;
    use cultivation_common::ScriptedRolls;
    use proptest::prelude::*;

    fn cultivator() -> Combatant {
        Combatant::new(CombatantId::new(1), "Han Li", base_stats(1, 1).expect("valid realm"))
    }

    fn dummy(health: f64) -> Combatant {
        Combatant::new(CombatantId::new(2), "Training Dummy", CombatStats::new().with_health(health))
    }

    #[test]
    fn test_forced_hit_no_crit_deals_attack() {
        let engine = BattleEngine::new();
        let mut attacker = cultivator();
        let mut defender = dummy(10_000.0);
        let mut rolls = ScriptedRolls::new([0.0, 0.99]);

        let log = engine
            .resolve_action(&mut attacker, &mut defender, &mut rolls)
            .expect("valid action");
        assert_eq!(log.kind, ActionKind::Resolved);
        assert!(!log.crit);
        assert_eq!(log.damage, 100.0);
        assert_eq!(defender.health, 9_900.0);
    }

    #[test]
    fn test_forced_crit_multiplies_damage() {
        let engine = BattleEngine::new();
        let mut attacker = cultivator();
        let mut defender = dummy(10_000.0);
        let mut rolls = ScriptedRolls::new([0.0, 0.0]);

        let log = engine
            .resolve_action(&mut attacker, &mut defender, &mut rolls)
            .expect("valid action");
        assert!(log.crit);
        assert_eq!(log.damage, 100.0 * attacker.stats.crit_damage);
        assert_eq!(defender.health, 10_000.0 - 150.0);
    }

    #[test]
    fn test_miss_sets_cooldown_only() {
        let engine = BattleEngine::new();
        let skill = SkillDefinition::new(SkillId::new(1), "Sword Rain", SkillEffect::FlatDamage)
            .with_cost(50.0)
            .with_cooldown(3);
        let mut attacker = cultivator().with_skill(skill.clone());
        let mut defender = dummy(1_000.0);
        let resource = attacker.resource;
        // pick skill, then fail the hit roll
        let mut rolls = ScriptedRolls::new([0.0, 0.99]);

        let log = engine
            .resolve_action(&mut attacker, &mut defender, &mut rolls)
            .expect("valid action");
        assert_eq!(log.kind, ActionKind::Missed);
        assert_eq!(defender.health, 1_000.0);
        assert_eq!(attacker.resource, resource);
        assert_eq!(attacker.cooldown(skill.id), 3);
    }

    #[test]
    fn test_stunned_actor_skips() {
        let engine = BattleEngine::new();
        let mut attacker = cultivator();
        attacker.add_effect(ActiveEffect::new(EffectKind::Stun, 0.0, 1));
        let mut defender = dummy(1_000.0);

        let log = engine
            .resolve_action(&mut attacker, &mut defender, &mut ScriptedRolls::always(0.0))
            .expect("valid action");
        assert_eq!(log.kind, ActionKind::Skipped);
        assert_eq!(defender.health, 1_000.0);
    }

    #[test]
    fn test_one_time_buff_spent_on_next_action() {
        let engine = BattleEngine::new();
        let mut attacker = cultivator();
        attacker.add_effect(EffectSpec::new(EffectKind::AttackBonus, 1.0, 5).once().activate(1.0, SkillId::new(9)));
        let mut defender = dummy(10_000.0);

        let first = engine
            .resolve_action(&mut attacker, &mut defender, &mut ScriptedRolls::new([0.0, 0.99]))
            .expect("valid action");
        let second = engine
            .resolve_action(&mut attacker, &mut defender, &mut ScriptedRolls::new([0.0, 0.99]))
            .expect("valid action");
        assert_eq!(first.damage, 200.0);
        assert_eq!(second.damage, 100.0);
    }

    #[test]
    fn test_lifesteal_and_reflect() {
        let engine = BattleEngine::new();
        let mut attacker = cultivator();
        attacker.stats.lifesteal = 0.5;
        attacker.health = 500.0;
        let mut defender = dummy(10_000.0);
        defender.stats.reflect_damage = 0.1;

        let log = engine
            .resolve_action(&mut attacker, &mut defender, &mut ScriptedRolls::new([0.0, 0.99]))
            .expect("valid action");
        assert_eq!(log.damage, 100.0);
        assert_eq!(log.reflected, 10.0);
        assert_eq!(log.healing, 50.0);
        assert_eq!(attacker.health, 540.0);
    }

    #[test]
    fn test_player_wins_and_collects_loot() {
        let player = cultivator();
        let enemy = dummy(150.0).with_loot("iron_ore");
        let outcome = BattleEngine::new()
            .simulate_with(player, enemy, &BattleOptions::new(), &mut ScriptedRolls::always(0.5))
            .expect("valid battle");
        assert!(outcome.player_won());
        assert!(!outcome.timed_out);
        assert_eq!(outcome.rounds_elapsed, 2);
        assert_eq!(outcome.loot, vec!["iron_ore".to_string()]);
        // overkill counts toward damage dealt
        assert_eq!(outcome.total_damage_dealt, 200.0);
        assert_eq!(outcome.total_damage_taken, 0.0);
    }

    #[test]
    fn test_fatal_protection_consumed_once() {
        let player = cultivator();
        let enemy = dummy(100.0).with_fatal_protection(0.5);
        let outcome = BattleEngine::new()
            .simulate_with(player, enemy, &BattleOptions::new(), &mut ScriptedRolls::always(0.0))
            .expect("valid battle");

        let revivals: usize = outcome
            .rounds
            .iter()
            .flat_map(|r| r.actions.iter())
            .map(|a| a.revived.len())
            .sum();
        assert_eq!(revivals, 1);
        assert!(outcome.player_won());
    }

    #[test]
    fn test_mutual_invulnerability_times_out() {
        let invulnerable = ActiveEffect::new(EffectKind::Invulnerable, 1.0, 1_000);
        let mut player = cultivator().with_fatal_protection(1.0);
        player.add_effect(invulnerable.clone());
        let mut enemy = dummy(1_000.0).with_fatal_protection(1.0);
        enemy.stats.attack = 100.0;
        enemy.add_effect(invulnerable);

        let outcome = BattleEngine::new()
            .simulate(player, enemy, &BattleOptions::new().with_seed(7).with_round_cap(12))
            .expect("valid battle");
        assert!(outcome.timed_out);
        assert_eq!(outcome.rounds_elapsed, 12);
        // equal health fractions: the challenger must win outright
        assert_eq!(outcome.winner, Side::Enemy);
    }

    #[test]
    fn test_malformed_stats_rejected() {
        let engine = BattleEngine::new();
        let mut broken = dummy(100.0);
        broken.stats.max_health = -5.0;
        let result = engine.simulate(cultivator(), broken, &BattleOptions::new().with_seed(1));
        assert!(matches!(result, Err(ConfigurationError::InvalidStat { .. })));

        let mut empty = dummy(100.0);
        empty.stats.max_health = 0.0;
        let result = engine.simulate(cultivator(), empty, &BattleOptions::new().with_seed(1));
        assert!(matches!(result, Err(ConfigurationError::NonPositiveHealth { .. })));
    }

    #[test]
    fn test_malformed_skill_rejected() {
        let bad = SkillDefinition::basic_attack().with_multiplier(f64::NAN);
        let result = BattleEngine::new().simulate(
            cultivator().with_skill(bad),
            dummy(100.0),
            &BattleOptions::new().with_seed(1),
        );
        assert!(matches!(result, Err(ConfigurationError::InvalidSkill { .. })));
    }

    #[test]
    fn test_slower_stunner_duration_counts_rounds() {
        let stunner = |duration| {
            let skill = SkillDefinition::new(
                SkillId::new(3),
                "Thunder Seal",
                SkillEffect::CrowdControl {
                    effect: EffectSpec::new(EffectKind::Stun, 0.0, duration),
                    chance: 1.0,
                },
            )
            .with_cooldown(5);
            dummy(1_000_000.0).with_skill(skill)
        };
        let player_second_turn = |duration| {
            let outcome = BattleEngine::new()
                .simulate_with(
                    cultivator(),
                    stunner(duration),
                    &BattleOptions::new().with_round_cap(2),
                    &mut ScriptedRolls::always(0.0),
                )
                .expect("valid battle");
            assert_eq!(outcome.rounds_elapsed, 2);
            // the cultivator is faster, so it acts first in each round
            outcome.rounds[1].actions[0].kind
        };

        // stun lands after the cultivator acted and wears off at round end
        assert_eq!(player_second_turn(1), ActionKind::Resolved);
        assert_eq!(player_second_turn(2), ActionKind::Skipped);
    }

    #[test]
    fn test_speed_tie_goes_to_lower_id() {
        let engine = BattleEngine::new();
        let a = Combatant::new(CombatantId::new(5), "a", CombatStats::new().with_speed(10.0));
        let b = Combatant::new(CombatantId::new(3), "b", CombatStats::new().with_speed(10.0));
        assert_eq!(engine.turn_order(&a, &b), [Side::Enemy, Side::Player]);
        let mut fast = a.clone();
        fast.stats.speed = 11.0;
        assert_eq!(engine.turn_order(&fast, &b), [Side::Player, Side::Enemy]);
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let skills = [
            SkillDefinition::new(
                SkillId::new(1),
                "Venom Palm",
                SkillEffect::CrowdControl {
                    effect: EffectSpec::new(EffectKind::Poison, 30.0, 3),
                    chance: 0.5,
                },
            )
            .with_cooldown(2),
            SkillDefinition::new(SkillId::new(2), "Qi Recovery", SkillEffect::Heal { fraction: 0.1 }).with_cooldown(3),
        ];
        let player = cultivator().with_skills(skills.clone());
        let mut enemy_stats = base_stats(1, 5).expect("valid realm");
        enemy_stats.attack = 80.0;
        let enemy = Combatant::new(CombatantId::new(2), "Wolf", enemy_stats).with_skills(skills);

        let engine = BattleEngine::new();
        let options = BattleOptions::new().with_seed(42);
        let first = engine.simulate(player.clone(), enemy.clone(), &options).expect("valid");
        let second = engine.simulate(player, enemy, &options).expect("valid");
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_battle_terminates_within_cap(
            seed in any::<u64>(),
            cap in 1u32..40,
            attack in 0.0f64..500.0,
            defense in 0.0f64..5_000.0,
            health in 1.0f64..50_000.0,
            evasion in 0.0f64..1.0,
            revive in 0.01f64..1.0,
        ) {
            let player = cultivator().with_fatal_protection(revive);
            let enemy_stats = CombatStats::new()
                .with_health(health.floor().max(1.0))
                .with_attack(attack)
                .with_defense(defense)
                .with_stat(cultivation_common::StatKey::Evasion, evasion);
            let enemy = Combatant::new(CombatantId::new(2), "Beast", enemy_stats).with_fatal_protection(revive);

            let outcome = BattleEngine::new()
                .simulate(player, enemy, &BattleOptions::new().with_seed(seed).with_round_cap(cap))
                .expect("well-formed combatants");
            prop_assert!(outcome.rounds_elapsed <= cap);
            prop_assert_eq!(outcome.timed_out, outcome.rounds_elapsed == cap && outcome.player_health > 0.0 && outcome.enemy_health > 0.0);
        }
    }
}
