//! Shared state handed to every selector and to the calibration harness.

use std::{
    fmt, sync::{
        Arc, atomic::{AtomicU64, Ordering}
    }
};

use serde::{Deserialize, Serialize};

use crate::{cost_table::CostTables, template_db::TemplateDatabase};

/// What the target device can do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Key of the device's calibration data.
    pub device_id: String,
    pub supports_fp16: bool,
    pub supports_fp64: bool,
    pub supports_subgroups: bool,
    pub max_work_group_size: usize,
    pub max_local_mem_size: usize,
}

impl Default for EngineInfo {
    fn default() -> Self {
        Self {
            device_id: "generic".to_string(),
            supports_fp16: true,
            supports_fp64: false,
            supports_subgroups: true,
            max_work_group_size: 256,
            max_local_mem_size: 64 * 1024,
        }
    }
}

/// Engine description, template sources, cost tables and the entry-point
/// counter. Built once and shared through an [`Arc`].
pub struct ComputeContext {
    pub engine: EngineInfo,
    templates: Arc<dyn TemplateDatabase>,
    cost_tables: CostTables,
    entry_point_counter: AtomicU64,
}

impl ComputeContext {
    pub fn new(engine: EngineInfo, templates: Arc<dyn TemplateDatabase>) -> Self {
        Self {
            engine,
            templates,
            cost_tables: CostTables::default(),
            entry_point_counter: AtomicU64::new(0),
        }
    }

    pub fn with_cost_tables(mut self, cost_tables: CostTables) -> Self {
        self.cost_tables = cost_tables;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn templates(&self) -> &dyn TemplateDatabase {
        self.templates.as_ref()
    }

    pub fn cost_tables(&self) -> &CostTables {
        &self.cost_tables
    }

    /// Unique suffix for the next generated entry point.
    pub fn next_entry_point_id(&self) -> u64 {
        self.entry_point_counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeContext")
            .field("engine", &self.engine)
            .field("cost_tables", &self.cost_tables)
            .field("entry_point_counter", &self.entry_point_counter.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
