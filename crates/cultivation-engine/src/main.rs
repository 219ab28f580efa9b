//! # Cultivation Engine
//!
//! Entry point for the cultivation combat and progression simulation.
//!
//! This binary ties together the library crates:
//! - Combat: stat aggregation and turn-based encounters
//! - Crafting: loot drops and material crafting with pity
//! - Progression: exp caps, quest boards and the versioned record store
//!
//! It loads configuration and content, registers a demo cultivator, runs the
//! configured encounters and prints each report as JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use cultivation_combat::{EquipSlot, EquipmentTemplate, ModifierAggregator};
use cultivation_common::{QuestId, Rarity, SkillId, StatKey, TemplateId, UserId};
use cultivation_crafting::CraftingEngine;
use cultivation_progression::{ProgressionRecord, ProgressionService, QuestAction, QuestBoard, QuestProgress};
use cultivation_engine::{craft_from_inventory, ContentStore, EncounterPlan, EncounterRunner, EngineConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cultivation=info".parse()?))
        .init();

    info!("Cultivation engine starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = EngineConfig::load();
    config.validate();

    let content = ContentStore::open(config.content_dir.clone()).context("loading content")?;
    let progression = ProgressionService::in_memory_system(config.progression.clone());
    let crafting = CraftingEngine::new(config.crafting.clone());

    let user = UserId::new(config.demo.user);
    progression.register(&demo_record(user)?)?;

    let runner = EncounterRunner::new(
        &progression,
        ModifierAggregator::with_config(config.aggregator.clone()),
        config.battle.clone(),
    );
    let skills: Vec<SkillId> = config.demo.skills.iter().copied().map(SkillId::new).collect();

    for round in 0..config.demo.encounters {
        let mut plan = EncounterPlan::new(user, config.demo.monster).with_skills(skills.iter().copied());
        if let Some(seed) = config.seed {
            // Two seeds per encounter: battle and drops
            plan = plan.with_seed(seed.wrapping_add(u64::from(round) * 2));
        }
        let report = runner.run_encounter(&content.read(), &plan)?;
        print_json(&report, config.pretty_json)?;
    }

    if let Some(craft) = craft_from_inventory(&progression, &crafting, user, EquipSlot::Weapon, config.seed)? {
        print_json(&craft, config.pretty_json)?;
    }

    let record = progression.load(user)?.value;
    info!(
        "{} finished at realm {} sub-level {} with {} exp, {} items",
        user,
        record.realm,
        record.sub_level,
        record.experience,
        record.equipment.len()
    );
    Ok(())
}

/// A realm-1 cultivator with a starter sword and a few quests.
fn demo_record(user: UserId) -> Result<ProgressionRecord> {
    let mut record = ProgressionRecord::new(user)
        .with_daily(
            QuestBoard::new()
                .with_quest(QuestProgress::new(QuestId::new(1), QuestAction::DefeatMonster, 3))
                .with_quest(QuestProgress::new(QuestId::new(2), QuestAction::Craft, 1)),
        )
        .with_weekly(QuestBoard::new().with_quest(QuestProgress::new(QuestId::new(3), QuestAction::DefeatMonster, 20)));

    let sword = EquipmentTemplate::new(TemplateId::new(1), EquipSlot::Weapon, "iron jian")
        .with_stat(StatKey::Attack, 20.0)
        .with_stat(StatKey::CritRate, 0.02)
        .generate(Rarity::Uncommon, 1, None)?;
    let sword_id = sword.id;
    record.equipment.add(sword);
    record.equipment.equip(sword_id, record.realm)?;
    Ok(record)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
