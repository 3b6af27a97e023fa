use std::sync::Arc;

use fnv::FnvHashMap;
use yomu_lib::{
    error::{Error, Result},
    models::SourceInfo,
};

use crate::engine::Engine;

/// Every registered source, keyed by source id.
#[derive(Default)]
pub struct SourceManager {
    engines: FnvHashMap<i64, Arc<Engine>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an engine, replacing one with the same source id.
    pub fn insert(&mut self, engine: Engine) -> SourceInfo {
        let source_info = engine.source_info();
        if self
            .engines
            .insert(source_info.id, Arc::new(engine))
            .is_some()
        {
            warn!("source {} ({}) replaced", source_info.name, source_info.id);
        }

        source_info
    }

    pub fn unload(&mut self, id: i64) -> Result<Arc<Engine>> {
        self.engines.remove(&id).ok_or(Error::UnknownSource(id))
    }

    pub fn get(&self, id: i64) -> Result<Arc<Engine>> {
        self.engines
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownSource(id))
    }

    /// Looks a source up by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Engine>> {
        self.engines
            .values()
            .find(|engine| engine.source_info().name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Every source, sorted by id.
    pub fn list(&self) -> Vec<SourceInfo> {
        let mut sources: Vec<SourceInfo> = self
            .engines
            .values()
            .map(|engine| engine.source_info())
            .collect();
        sources.sort_by_key(|source| source.id);
        sources
    }
}
