//! `keel status` command - List the migration ledger.

use keel_migrate::{SynthesisConfig, SynthesisEngine};

use crate::cli::{GlobalArgs, StatusArgs};
use crate::config;
use crate::error::CliResult;
use crate::logging;
use crate::output::{self, Mark};

/// Run the status command
pub async fn run(args: StatusArgs, global: &GlobalArgs) -> CliResult<()> {
    let keel_config = config::load(&args.root, global.env.as_deref())?;
    logging::init(global.verbose, &keel_config.debug.log_level);

    let mut synthesis = SynthesisConfig::from_keel_config(&keel_config, &args.root);
    if let Some(dir) = &args.migrations {
        synthesis = synthesis.migrations_dir(dir.clone());
    }
    let migrations_dir = synthesis.migrations_dir.clone();
    let status = SynthesisEngine::new(synthesis).status().await?;

    output::header("keel status");
    output::field("Migrations", &migrations_dir.display().to_string());
    output::field("Recorded", &status.entries.len().to_string());
    output::blank();

    if status.entries.is_empty() && status.untracked.is_empty() {
        output::note("No migrations recorded yet. Run `keel generate` to create some.");
        return Ok(());
    }

    for entry in &status.entries {
        let mark = if status.missing.iter().any(|m| m.name == entry.name) {
            Mark::Missing
        } else {
            Mark::Recorded
        };
        output::marked(
            mark,
            &format!("{} ({})", entry.name, entry.recorded_at.format("%Y-%m-%d %H:%M:%S")),
        );
    }
    for artifact in &status.untracked {
        output::marked(Mark::Untracked, &artifact.name);
    }

    if !status.missing.is_empty() {
        output::blank();
        output::warn(&format!(
            "{} recorded migration(s) have no directory on disk",
            status.missing.len()
        ));
    }
    Ok(())
}
