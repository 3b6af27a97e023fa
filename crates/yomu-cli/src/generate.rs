use std::path::Path;

use anyhow::Result;
use yomu_engine::manager::SourceManager;

use crate::data::Index;

/// Writes `index.json` describing every registered source into `out`.
pub fn generate_json(manager: &SourceManager, out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)?;

    let sources = manager
        .list()
        .into_iter()
        .map(|source| Index {
            path: format!("sources/{}", slug(&source.name)),
            id: source.id,
            name: source.name,
            version: source.version,
            lib_version: yomu_lib::LIB_VERSION.to_string(),
            icon: source.icon,
        })
        .collect::<Vec<Index>>();

    let file = std::fs::File::create(out.join("index.json"))?;
    serde_json::to_writer_pretty(&file, &sources)?;
    info!("wrote {} sources to {:?}", sources.len(), out.join("index.json"));

    Ok(())
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
