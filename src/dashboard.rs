//! Dashboard orchestration.
//!
//! Owns the loaded records, the filter store and the aggregation cache, and
//! rebuilds every chart from scratch whenever it is asked for views.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregates;
use crate::charts::{self, ChartKind};
use crate::data::{load_records, LoadOptions, Record};
use crate::filter::{session, Dropdown, FilterField, FilterPanel, FilterSelection, FilterStore};
use crate::graph::render_scene;
use crate::ir::Scene;
use crate::RenderOptions;

/// Identifies one load request; only the newest may apply its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Memoized aggregations keyed by selection.
#[derive(Debug, Default)]
pub struct AggregationCache {
    entries: HashMap<FilterSelection, Rc<Aggregates>>,
    hits: usize,
    misses: usize,
}

impl AggregationCache {
    pub fn get_or_compute(&mut self, records: &[Record], selection: &FilterSelection) -> Rc<Aggregates> {
        if let Some(cached) = self.entries.get(selection) {
            self.hits += 1;
            return Rc::clone(cached);
        }
        self.misses += 1;
        debug!(%selection, "computing aggregations");
        let aggregates = Rc::new(Aggregates::compute(records, selection));
        self.entries.insert(selection.clone(), Rc::clone(&aggregates));
        aggregates
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// Scenes for all three charts under one selection.
#[derive(Debug, Clone)]
pub struct Views {
    pub aggregates: Rc<Aggregates>,
    pub bar: Scene,
    pub trend: Scene,
    pub parallel: Scene,
}

impl Views {
    pub fn scene(&self, kind: ChartKind) -> &Scene {
        match kind {
            ChartKind::Bar => &self.bar,
            ChartKind::Trend => &self.trend,
            ChartKind::Parallel => &self.parallel,
        }
    }
}

pub struct Dashboard {
    records: Rc<[Record]>,
    store: Rc<RefCell<FilterStore>>,
    panel: FilterPanel,
    generation: u64,
    cache: AggregationCache,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    /// An empty dashboard: every option list is `["ALL"]`, every chart empty.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        let records: Rc<[Record]> = records.into();
        Self {
            panel: FilterPanel::from_records(&records),
            records,
            store: Rc::new(RefCell::new(FilterStore::new())),
            generation: 0,
            cache: AggregationCache::default(),
        }
    }

    /// Load a CSV file synchronously, replacing the current records.
    pub fn load(&mut self, path: &Path, options: LoadOptions) -> usize {
        let ticket = self.begin_load();
        let records = load_records(path, options);
        let count = records.len();
        self.complete_load(ticket, records);
        count
    }

    /// Start a load; any ticket handed out earlier becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket(self.generation)
    }

    /// Apply loaded records if `ticket` is still the newest load.
    pub fn complete_load(&mut self, ticket: LoadTicket, records: Vec<Record>) -> bool {
        if ticket.0 != self.generation {
            warn!(
                ticket = ticket.0,
                current = self.generation,
                "discarding records from a superseded load"
            );
            return false;
        }
        self.records = records.into();
        self.panel = FilterPanel::from_records(&self.records);
        self.cache.clear();
        info!(records = self.records.len(), "record set replaced");
        true
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn panel(&self) -> &FilterPanel {
        &self.panel
    }

    pub fn store(&self) -> Rc<RefCell<FilterStore>> {
        Rc::clone(&self.store)
    }

    /// Make this dashboard's store the active session for the thread.
    pub fn session(&self) -> session::SessionGuard {
        session::provide(self.store())
    }

    pub fn selection(&self) -> FilterSelection {
        self.store.borrow().selection().clone()
    }

    pub fn dropdowns(&self) -> [Dropdown; 3] {
        self.panel.dropdowns(&self.selection())
    }

    /// Apply a user choice through the control panel.
    pub fn choose(&mut self, field: FilterField, value: &str) -> bool {
        let next = self.panel.cascade(&self.selection(), field, value);
        let changed = FilterStore::commit(&self.store, next);
        if changed {
            debug!(selection = %self.selection(), "selection updated");
        }
        changed
    }

    pub fn reset(&mut self) -> bool {
        FilterStore::commit(&self.store, FilterSelection::default())
    }

    pub fn cache(&self) -> &AggregationCache {
        &self.cache
    }

    pub fn aggregates(&mut self) -> Rc<Aggregates> {
        let selection = self.selection();
        self.cache.get_or_compute(&self.records, &selection)
    }

    pub fn views(&mut self) -> Views {
        let aggregates = self.aggregates();
        Views {
            bar: charts::build(ChartKind::Bar, &aggregates),
            trend: charts::build(ChartKind::Trend, &aggregates),
            parallel: charts::build(ChartKind::Parallel, &aggregates),
            aggregates,
        }
    }

    pub fn scene(&mut self, kind: ChartKind) -> Scene {
        charts::build(kind, &self.aggregates())
    }

    /// Render every chart into `dir` as `<chart>.<ext>`.
    pub fn render_all(&mut self, dir: &Path, options: &RenderOptions) -> Result<Vec<PathBuf>> {
        let views = self.views();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let mut written = Vec::new();
        for kind in ChartKind::ALL {
            let bytes = render_scene(views.scene(kind), options)
                .with_context(|| format!("Failed to render {} chart", kind))?;
            let path = dir.join(format!("{}.{}", kind.file_stem(), options.format.extension()));
            fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        info!(
            selection = %views.aggregates.selection,
            dir = %dir.display(),
            charts = written.len(),
            "rendered dashboard"
        );
        Ok(written)
    }
}
