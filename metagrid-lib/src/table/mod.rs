//! Table view controller
//!
//! [`TableController`] owns one table view: it fetches the rows, derives the
//! columns, and runs edits and actions against them. Its state is a plain
//! [`TableState`] value so navigating away and back can restore it as it
//! was.
//!
//! # Example
//!
//! ```ignore
//! let mut table = TableController::new(api.clone(), "/fields");
//! table.init(TableOptions::from_value(json!({"tableAPI": "field"}))?).await?;
//!
//! table.add_row().await?;
//! table.set_field("name", json!("North"))?;
//! if table.save_row().await? {
//!     println!("{} rows", table.rows().len());
//! }
//! ```

mod actions;
mod edit;
mod filter;
mod load;
mod options;

pub use edit::DeletePrompt;
pub use filter::ColumnFilter;
pub use filter::Filters;
pub use options::ContextValue;
pub use options::SelectionMode;
pub use options::TableOptions;

use std::sync::Arc;

use serde_json::Value;

use crate::api::Api;
use crate::context::AppContext;
use crate::editor::ChangedRows;
use crate::editor::OverlayState;
use crate::editor::RowEditor;
use crate::editor::row_to_object;
use crate::error::Error;
use crate::model::Attribute;
use crate::model::Column;
use crate::model::ColumnIndex;
use crate::model::Dataset;
use crate::model::Encoding;
use crate::model::Row;
use crate::model::RowObject;
use crate::model::value_text;
use crate::resolver::LookupResolver;
use crate::response::CacheStatus;

/// Everything a table view holds between user actions.
#[derive(Debug, Clone)]
pub struct TableState {
    pub options: TableOptions,
    pub encoding: Encoding,
    /// Declared attributes of a compact payload, kept to re-encode the rows.
    pub attributes: Vec<Attribute>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Where the primary key sits in a row.
    pub key_index: ColumnIndex,
    pub params: Option<RowObject>,
    pub context_values: Vec<ContextValue>,
    pub filters: Filters,
    /// Selected row positions, ascending.
    pub selected: Vec<usize>,
    pub changed: ChangedRows,
    pub editor: RowEditor,
    pub overlay: Option<OverlayState>,
    /// Row the last row action ran on.
    pub action_row: Option<usize>,
    pub read_only: bool,
    pub loaded: bool,
    /// Where the current rows came from.
    pub cache: CacheStatus,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            options: TableOptions::default(),
            encoding: Encoding::Compact,
            attributes: Vec::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            key_index: ColumnIndex::Position(0),
            params: None,
            context_values: Vec::new(),
            filters: Filters::default(),
            selected: Vec::new(),
            changed: ChangedRows::new(),
            editor: RowEditor::new(),
            overlay: None,
            action_row: None,
            read_only: false,
            loaded: false,
            cache: CacheStatus::None,
        }
    }
}

impl TableState {
    pub fn new(options: TableOptions) -> Self {
        Self {
            context_values: options.context_values.clone(),
            options,
            ..Self::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key value of a row.
    pub fn row_key(&self, row: &Row) -> Value {
        row.value(&self.key_index)
    }

    /// A row in named-property form. Plain rows keep keys without a column.
    pub fn row_object(&self, row: &Row) -> RowObject {
        match row {
            Row::Plain(obj) => obj.clone(),
            Row::Compact(_) => row_to_object(row, &self.columns),
        }
    }

    /// Drops a row, keeping the selection and action row pointing at the
    /// same rows.
    pub(crate) fn remove_row(&mut self, index: usize) -> Option<Row> {
        if index >= self.rows.len() {
            return None;
        }
        let row = self.rows.remove(index);
        self.selected.retain(|i| *i != index);
        for i in &mut self.selected {
            if *i > index {
                *i -= 1;
            }
        }
        self.action_row = match self.action_row {
            Some(i) if i == index => None,
            Some(i) if i > index => Some(i - 1),
            other => other,
        };
        self.overlay = None;
        Some(row)
    }
}

/// Controller of one table view.
pub struct TableController {
    api: Api,
    resolver: LookupResolver,
    route_path: String,
    state: TableState,
}

impl TableController {
    /// A controller for the view at `route_path`.
    pub fn new(api: Api, route_path: impl Into<String>) -> Self {
        Self {
            resolver: LookupResolver::new(api.clone()),
            api,
            route_path: route_path.into(),
            state: TableState::default(),
        }
    }

    /// The shared application context.
    pub fn context(&self) -> &Arc<AppContext> {
        self.api.context()
    }

    /// The gateway this table fetches through.
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// The resolver loading this table's lookups.
    pub fn resolver(&self) -> &LookupResolver {
        &self.resolver
    }

    /// Path of the view showing this table.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    /// Current rows, columns and editing state.
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// The configuration the table was initialized with.
    pub fn options(&self) -> &TableOptions {
        &self.state.options
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[Column] {
        &self.state.columns
    }

    /// All rows, unfiltered.
    pub fn rows(&self) -> &[Row] {
        &self.state.rows
    }

    /// Row `index`, failing with `Error::RowOutOfRange`.
    pub fn row(&self, index: usize) -> Result<&Row, Error> {
        self.state.rows.get(index).ok_or(Error::RowOutOfRange(index))
    }

    /// Row `index` in named-property form.
    pub fn row_to_object(&self, index: usize) -> Result<RowObject, Error> {
        let row = self.row(index)?;
        Ok(self.state.row_object(row))
    }

    /// Whether existing rows may be edited.
    pub fn can_edit(&self) -> bool {
        self.state.options.allow_edit
    }

    /// Whether new rows may be added.
    pub fn can_add(&self) -> bool {
        self.state.options.allow_new
    }

    /// Whether rows may be deleted.
    pub fn can_delete(&self) -> bool {
        self.state.options.allow_delete
    }

    // =========================================================================
    // Filtering and selection
    // =========================================================================

    /// Per-column filters, for the caller to adjust.
    pub fn filters_mut(&mut self) -> &mut Filters {
        &mut self.state.filters
    }

    /// Resets every filter to its column's default operator.
    pub fn clear_filters(&mut self) {
        self.state.filters = Filters::for_columns(&self.state.columns);
    }

    /// Positions of the rows passing the filters.
    pub fn filtered_indices(&self) -> Vec<usize> {
        self.state
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.state.filters.matches(row, &self.state.columns))
            .map(|(i, _)| i)
            .collect()
    }

    /// Rows passing every active filter.
    pub fn filtered_rows(&self) -> Vec<&Row> {
        self.filtered_indices()
            .into_iter()
            .filter_map(|i| self.state.rows.get(i))
            .collect()
    }

    /// Selects or deselects a row. Single selection replaces the previous one.
    pub fn select_row(&mut self, index: usize, selected: bool) -> Result<(), Error> {
        if index >= self.state.rows.len() {
            return Err(Error::RowOutOfRange(index));
        }
        match (self.state.options.selection, selected) {
            (SelectionMode::None, _) => {
                log::debug!("selection is off for this table");
            }
            (_, false) => self.state.selected.retain(|i| *i != index),
            (SelectionMode::Single, true) => self.state.selected = vec![index],
            (SelectionMode::Multiple, true) => {
                if let Err(pos) = self.state.selected.binary_search(&index) {
                    self.state.selected.insert(pos, index);
                }
            }
        }
        Ok(())
    }

    /// Deselects every row.
    pub fn clear_selection(&mut self) {
        self.state.selected.clear();
    }

    /// Selected rows, in selection order.
    pub fn selected_rows(&self) -> Vec<&Row> {
        self.state
            .selected
            .iter()
            .filter_map(|i| self.state.rows.get(*i))
            .collect()
    }

    // =========================================================================
    // Offline mirror
    // =========================================================================

    /// Tables are served from the offline cache when configured cacheable or
    /// shown on an offline-capable route.
    fn prefer_cache(&self) -> bool {
        self.state.options.cacheable
            || self
                .context()
                .route(&self.route_path)
                .is_some_and(|route| route.offline)
    }

    /// Rewrites the offline copy of a table-sourced dataset after a change.
    async fn mirror(&self) {
        let Some(source) = self.state.options.source() else {
            return;
        };
        let cache = self.api.cache();
        if !source.is_table() || !cache.is_enabled() || !self.prefer_cache() {
            return;
        }
        // Detail tables hold a filtered subset.
        if self.state.options.parent().is_some() {
            log::debug!("not mirroring filtered detail table");
            return;
        }
        let dataset = Dataset::from_rows(self.state.encoding, self.state.attributes.clone(), &self.state.rows);
        if let Err(e) = cache
            .write(&cache.config().dataset, &source.cache_table(), &dataset)
            .await
        {
            log::warn!("could not refresh offline copy of {}: {}", source.cache_table(), e);
        }
    }

    fn key_text(&self, row: &Row) -> String {
        value_text(&self.state.row_key(row))
    }
}
