//! Delete command implementation.

use super::{print_json, Context};
use crate::files::RecordFile;
use cmdb_engine::{Deletion, DeletionPolicy, EngineOptions};
use std::path::Path;

/// Runs the delete command.
///
/// Without a retirement field the remote record is left in place.
pub fn run(
    ctx: &Context,
    path: &Path,
    retire: Option<(String, String)>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = RecordFile::load(path)?;
    let policy = match retire {
        Some((field, value)) => DeletionPolicy::Retire { field, value },
        None => DeletionPolicy::Orphan,
    };
    let engine = ctx.connect(&file, EngineOptions::new().with_deletion(policy))?;
    let deletion = engine.delete(&file.record)?;

    match format {
        "json" => print_json(&deletion)?,
        _ => println!("{}", describe(deletion)),
    }
    Ok(())
}

fn describe(deletion: Deletion) -> &'static str {
    match deletion {
        Deletion::Orphaned => "orphaned (remote record left in place)",
        Deletion::Retired => "retired",
        Deletion::NeverCreated => "never created",
    }
}
