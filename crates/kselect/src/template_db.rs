//! Source templates the jit header is prepended to.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Lookup of generic kernel sources by template name.
pub trait TemplateDatabase: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<str>>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryTemplateDatabase {
    templates: FxHashMap<String, Arc<str>>,
}

impl InMemoryTemplateDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// One comment-only source per name, for dry runs without real sources.
    pub fn with_placeholders<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut db = Self::new();
        for name in names {
            db.insert(name, format!("// {name}\n"));
        }
        db
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<Arc<str>>) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateDatabase for InMemoryTemplateDatabase {
    fn get(&self, name: &str) -> Option<Arc<str>> {
        self.templates.get(name).cloned()
    }
}
