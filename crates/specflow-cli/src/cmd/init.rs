use crate::output::print_json;
use anyhow::Context;
use specflow_core::config::Config;
use specflow_core::{io, paths, FlowDb};
use std::path::Path;

pub fn run(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(&paths::specflow_dir(root)).context("failed to create .specflow/")?;

    let config_path = paths::config_path(root);
    let created = !config_path.exists();
    let config = if created {
        let config = Config::new(name);
        config.save(root).context("failed to write config")?;
        config
    } else {
        Config::load(root).context("failed to load existing config")?
    };

    let db_path = config.db_path(root);
    FlowDb::open(&db_path)
        .with_context(|| format!("failed to create database at {}", db_path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": config.project.name,
            "database": db_path.display().to_string(),
            "created": created,
        }))?;
    } else if created {
        println!("Initialized specflow for '{}' in {}", name, root.display());
    } else {
        println!(
            "Already initialized for '{}'; config left unchanged",
            config.project.name
        );
    }
    Ok(())
}
