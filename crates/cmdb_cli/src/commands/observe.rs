//! Observe command implementation.

use super::{print_json, Context};
use crate::files::RecordFile;
use cmdb_engine::{EngineOptions, Observation, RecordState};
use std::path::Path;

/// Runs the observe command.
pub fn run(ctx: &Context, path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = RecordFile::load(path)?;
    let engine = ctx.connect(&file, EngineOptions::default())?;
    let observation = engine.observe(&file.record)?;

    match format {
        "json" => print_json(&observation)?,
        _ => print_text_output(&file, &observation),
    }
    Ok(())
}

fn print_text_output(file: &RecordFile, observation: &Observation) {
    let desired = &file.record.desired;
    println!("Class:    {}", desired.class_name);
    println!("Name:     {}", desired.name);
    println!(
        "Identity: {}",
        file.record
            .identity()
            .map_or("(not created)", |identity| identity.as_str())
    );
    println!("State:    {}", state_label(observation.state()));

    if !observation.drift.is_empty() {
        println!();
        println!("Drift:");
        for drift in &observation.drift {
            println!(
                "  {}: desired {:?}, current {}",
                drift.field,
                drift.desired,
                drift
                    .current
                    .as_deref()
                    .map_or_else(|| "(missing)".to_string(), |value| format!("{value:?}"))
            );
        }
    }
}

fn state_label(state: RecordState) -> &'static str {
    match state {
        RecordState::Absent => "absent",
        RecordState::Drifted => "drifted",
        RecordState::Synced => "synced",
    }
}
