//! Apply command implementation.

use super::{print_json, Context};
use crate::files::RecordFile;
use cmdb_engine::{CycleOutcome, EngineOptions};
use std::path::Path;
use tracing::info;

/// Runs one reconcile cycle and stores a newly bound identity in the file.
pub fn run(
    ctx: &Context,
    path: &Path,
    validate_on_create: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = RecordFile::load(path)?;
    let options = EngineOptions::new().with_validate_on_create(validate_on_create);
    let engine = ctx.connect(&file, options)?;

    let was_bound = file.record.is_bound();
    let outcome = engine.reconcile(&mut file.record)?;
    if !was_bound && file.record.is_bound() {
        file.save(path)?;
        info!(path = %path.display(), "stored remote identity");
    }

    match format {
        "json" => print_json(&outcome)?,
        _ => println!("{}", describe(&outcome)),
    }
    Ok(())
}

fn describe(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Created(creation) => format!("created {}", creation.identity),
        CycleOutcome::Updated(update) => format!("updated {}", update.identity),
        CycleOutcome::UpToDate => "up to date".to_string(),
    }
}
