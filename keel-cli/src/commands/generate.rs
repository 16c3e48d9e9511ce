//! `keel generate` command - Synthesize migrations from model descriptions.

use keel_migrate::{RunReport, SynthesisEngine};

use crate::cli::{GenerateArgs, GlobalArgs};
use crate::config;
use crate::error::{CliError, CliResult};
use crate::logging;
use crate::output::{self, Mark};

/// Run the generate command
pub async fn run(args: GenerateArgs, global: &GlobalArgs) -> CliResult<()> {
    let keel_config = config::load(&args.root, global.env.as_deref())?;
    logging::init(global.verbose, &keel_config.debug.log_level);

    let synthesis = config::synthesis_config(&keel_config, &args);
    output::header("keel generate");
    output::field("Dialect", synthesis.dialect.as_str());
    output::field("Models", &synthesis.models_dir.display().to_string());
    output::field("Migrations", &synthesis.migrations_dir.display().to_string());
    if synthesis.dry_run {
        output::field("Mode", "dry run");
    }
    output::blank();

    let engine = SynthesisEngine::new(synthesis);
    let report = match &args.model {
        Some(path) => engine.run_model(path).await?,
        None => engine.run().await?,
    };

    print_report(&report);

    if report.has_failures() {
        output::blank();
        for failure in &report.failures {
            output::error(&format!("{}: {}", failure.model, failure.error));
        }
        return Err(CliError::FailedModels(report.failures.len()));
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for artifact in &report.written {
        if report.dry_run {
            output::note(&format!("Would write {}", artifact.name));
            output::sql(&artifact.up_sql);
        } else {
            output::marked(Mark::Wrote, &artifact.path.display().to_string());
        }
    }
    for logical_name in &report.skipped {
        output::quiet(&format!("skipped {} (already recorded)", logical_name));
    }
    for model in &report.baselined {
        output::marked(Mark::Baselined, model);
    }
    for warning in &report.warnings {
        output::warn(warning);
    }

    output::blank();
    if report.has_changes() || report.failures.is_empty() {
        output::success(&report.summary());
    } else {
        output::note(&report.summary());
    }
}
