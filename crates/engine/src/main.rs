use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use larder_engine::Engine;
use larder_infra::{CatalogDocument, EngineConfig, import_catalog};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("LARDER_CONFIG").map(PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref()).context("loading configuration")?;
    larder_observability::init(&config.log);

    let engine = Engine::new(&config).context("building engine")?;

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let document = CatalogDocument::from_json(&json)?;
        import_catalog(engine.database(), document).with_context(|| format!("importing {}", path.display()))?;
        info!(catalog = %path.display(), "catalog loaded");
    }

    let report = engine.costs().cost_report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
