//! `keel init` command - Initialize a new Keel project.

use std::path::Path;

use keel_schema::{Dialect, KeelConfig};

use crate::cli::{GlobalArgs, InitArgs};
use crate::config::{self, CONFIG_FILE_NAME};
use crate::error::CliResult;
use crate::logging;
use crate::output;

/// Example model written by `keel init`.
const EXAMPLE_MODEL: &str = r#"{
  "name": "User",
  "attributes": {
    "email": { "type": "string", "required": true, "unique": true },
    "name": { "type": "string", "max": 100 },
    "role": { "type": "string", "choices": ["member", "admin"], "default": "member" }
  },
  "hasMany": ["Post"],
  "traits": { "useTimestamps": true }
}
"#;

/// Example related model written by `keel init`.
const EXAMPLE_RELATED_MODEL: &str = r#"{
  "name": "Post",
  "attributes": {
    "title": { "type": "string", "required": true },
    "body": "text",
    "published": { "type": "boolean", "default": false }
  },
  "traits": { "useTimestamps": true, "useSoftDeletes": true }
}
"#;

/// Run the init command
pub async fn run(args: InitArgs, global: &GlobalArgs) -> CliResult<()> {
    logging::init(global.verbose, "warn");
    output::header("keel init");

    let project_path = args
        .path
        .canonicalize()
        .unwrap_or_else(|_| args.path.clone());

    let config_path = project_path.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        output::warn(&format!(
            "Project already initialized. {} exists (use --force to overwrite).",
            CONFIG_FILE_NAME
        ));
        return Ok(());
    }

    let dialect: Dialect = args.dialect.into();
    let keel_config = config::default_for_dialect(dialect);

    create_project_structure(&project_path, &keel_config)?;
    config::save(&keel_config, &config_path)?;
    if !args.no_example {
        create_example_models(&project_path, &keel_config)?;
    }

    output::success(&format!("Initialized a {} project", dialect));
    output::blank();
    output::section("Layout");
    output::field(CONFIG_FILE_NAME, "configuration");
    output::field(&keel_config.paths.models, "model descriptions");
    output::field(&keel_config.paths.migrations, "artifacts and ledger");
    output::field(&keel_config.paths.snapshots, "attribute snapshots");
    output::blank();
    output::note("Describe your models, then run `keel generate`.");

    Ok(())
}

/// Create the project directory structure
fn create_project_structure(root: &Path, config: &KeelConfig) -> CliResult<()> {
    let paths = config.resolve_paths(root);
    std::fs::create_dir_all(&paths.models)?;
    std::fs::create_dir_all(&paths.snapshots)?;
    std::fs::create_dir_all(&paths.migrations)?;

    let gitkeep_path = paths.migrations.join(".gitkeep");
    if !gitkeep_path.exists() {
        std::fs::write(gitkeep_path, "")?;
    }
    Ok(())
}

/// Write the example models unless they already exist
fn create_example_models(root: &Path, config: &KeelConfig) -> CliResult<()> {
    let models = config.resolve_paths(root).models;
    for (file, content) in [
        ("User.json", EXAMPLE_MODEL),
        ("Post.json", EXAMPLE_RELATED_MODEL),
    ] {
        let path = models.join(file);
        if !path.exists() {
            std::fs::write(path, content)?;
        }
    }
    Ok(())
}
