use serde_json::Value;

use super::TableController;
use crate::editor::EditMode;
use crate::editor::EditingState;
use crate::editor::OverlayState;
use crate::editor::Rect;
use crate::editor::Widget;
use crate::editor::apply_save_result;
use crate::editor::clear_server_stamps;
use crate::editor::create_empty_row;
use crate::editor::create_row_for_table;
use crate::editor::edit_snapshot;
use crate::editor::prepare_row;
use crate::editor::row_to_object;
use crate::editor::validate_row;
use crate::error::Error;
use crate::model::ColumnIndex;
use crate::model::RowObject;
use crate::model::find_lookup_value;
use crate::store::LocalStore;
use crate::transport::Verb;

const DELETE_PROMPT: &str = "Delete row?";

/// How a row deletion is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletePrompt {
    /// Ask "Delete row?".
    #[default]
    Ask,
    /// Ask with a custom message.
    Message(String),
    /// The user already confirmed.
    Confirmed,
}

impl TableController {
    pub(super) fn table_api(&self) -> Result<String, Error> {
        self.state
            .options
            .table_api
            .clone()
            .ok_or_else(|| Error::InvalidAction("table has no table API".to_string()))
    }

    // =========================================================================
    // Form editing
    // =========================================================================

    /// Opens the form on a new row.
    ///
    /// Columns remembering their previous value start with it, and their
    /// label column with its lookup label.
    pub async fn add_row(&mut self) -> Result<(), Error> {
        self.resolver.load_all(&self.state.columns).await;
        let parent = self.state.options.parent();
        let mut row = create_empty_row(&self.state.columns, parent.as_ref());

        let store = self.context().store().clone();
        for col in self.state.columns.iter().filter(|c| c.default_previous) {
            let remembered = match store.get::<Value>(&LocalStore::default_key(&col.name)).await {
                Ok(value) => value.filter(|v| !v.is_null()),
                Err(e) => {
                    log::warn!("could not read remembered {}: {}", col.name, e);
                    None
                }
            };
            let Some(value) = remembered else {
                continue;
            };
            if let Some(lookup) = &col.lookup {
                self.resolver.load(lookup).await;
                row.insert(format!("{}_val", col.name), Value::String(find_lookup_value(&value, lookup)));
            }
            row.insert(col.name.clone(), value);
        }

        self.state.editor.begin_add(row);
        Ok(())
    }

    /// Opens the form on row `index`.
    pub async fn edit_row(&mut self, index: usize) -> Result<(), Error> {
        let row = self.row(index)?.clone();
        self.resolver.load_all(&self.state.columns).await;
        let snapshot = edit_snapshot(&row, &self.state.columns);
        self.state.editor.begin_edit(index, snapshot);
        Ok(())
    }

    /// Sets a field of the open form and marks the form changed.
    ///
    /// Setting a lookup column also fills its label column.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        if let Some(lookup) = self.state.column(name).and_then(|c| c.lookup.clone()) {
            let label = find_lookup_value(&value, &lookup);
            self.state
                .editor
                .set_field(&format!("{}_val", name), Value::String(label))?;
        }
        self.state.editor.set_field(name, value)?;
        self.context().set_form_changed(true);
        Ok(())
    }

    /// The row open in the form, if any.
    pub fn editing(&self) -> Option<&EditingState> {
        self.state.editor.editing()
    }

    /// Saves the open form through the table API.
    pub async fn save_row(&mut self) -> Result<bool, Error> {
        self.save_row_to(None, None).await
    }

    /// Saves the open form to `path` with `verb`, defaulting to
    /// `Table/{table}` with POST for new rows and PUT for edits.
    ///
    /// Returns `Ok(false)` when the server call failed; the form stays open.
    /// Local validation failures are errors and send nothing.
    pub async fn save_row_to(&mut self, path: Option<&str>, verb: Option<Verb>) -> Result<bool, Error> {
        let editing = self.state.editor.editing().cloned().ok_or(Error::NotEditing)?;
        let path = match path {
            Some(path) => path.to_string(),
            None => format!("Table/{}", self.table_api()?),
        };
        let columns = &self.state.columns;

        validate_row(&editing.row, columns)?;
        let mut obj = editing.row.clone();
        prepare_row(&mut obj, columns)?;
        if editing.mode == EditMode::Add {
            clear_server_stamps(&mut obj);
        }

        let store = self.context().store().clone();
        for col in columns.iter().filter(|c| c.default_previous) {
            let value = obj.get(&col.name).cloned().unwrap_or(Value::Null);
            if let Err(e) = store.set(&LocalStore::default_key(&col.name), &value).await {
                log::warn!("could not remember {}: {}", col.name, e);
            }
        }

        let verb = verb.unwrap_or(match editing.mode {
            EditMode::Add => Verb::Post,
            EditMode::Edit => Verb::Put,
        });
        let Some(result) = self.api.save_row(&path, &obj, verb).await else {
            return Ok(false);
        };

        let mut row = create_row_for_table(&obj, columns, self.state.encoding);
        apply_save_result(&mut row, columns, &self.state.key_index, &result, editing.mode);
        match (editing.mode, editing.index) {
            (EditMode::Edit, Some(index)) if index < self.state.rows.len() => self.state.rows[index] = row,
            (EditMode::Edit, index) => {
                log::warn!("edited row {:?} is gone, appending", index);
                self.state.rows.push(row);
            }
            (EditMode::Add, _) => self.state.rows.push(row),
        }

        self.context().set_form_changed(false);
        self.state.editor.finish();
        self.mirror().await;
        Ok(true)
    }

    /// Discards the open form.
    pub fn cancel_edit(&mut self) {
        if self.state.editor.cancel().is_some() {
            self.context().set_form_changed(false);
        }
    }

    /// Writes named properties into the row under edit, or the row the last
    /// row action ran on.
    pub fn update_row(&mut self, props: &RowObject) -> Result<(), Error> {
        let index = self
            .state
            .editor
            .editing()
            .and_then(|e| e.index)
            .or(self.state.action_row)
            .ok_or(Error::NotEditing)?;
        if self.state.editor.editing().is_some() {
            self.state.editor.update(props)?;
        }

        let indexes: Vec<_> = props
            .iter()
            .map(|(name, value)| {
                let index = self
                    .state
                    .column(name)
                    .map(|c| c.index.clone())
                    .unwrap_or_else(|| ColumnIndex::Key(name.clone()));
                (index, value.clone())
            })
            .collect();
        let row = self
            .state
            .rows
            .get_mut(index)
            .ok_or(Error::RowOutOfRange(index))?;
        for (column, value) in indexes {
            row.set(&column, value);
        }
        Ok(())
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Deletes row `index` through the table API after confirmation.
    pub async fn delete_row(&mut self, index: usize, prompt: DeletePrompt) -> Result<bool, Error> {
        let table = self.table_api()?;
        self.delete_row_in(&table, index, prompt).await
    }

    pub(crate) async fn delete_row_in(&mut self, table: &str, index: usize, prompt: DeletePrompt) -> Result<bool, Error> {
        let key = self.state.row_key(self.row(index)?);
        let confirmed = match prompt {
            DeletePrompt::Confirmed => true,
            DeletePrompt::Ask => self.context().surface().confirm(DELETE_PROMPT).await,
            DeletePrompt::Message(message) => self.context().surface().confirm(&message).await,
        };
        if !confirmed {
            return Ok(false);
        }
        if self.api.delete_row(table, &key).await.is_none() {
            return Ok(false);
        }
        self.forget_row(index);
        self.mirror().await;
        Ok(true)
    }

    /// Drops a row deleted on the server, along with any queued change.
    pub(super) fn forget_row(&mut self, index: usize) {
        let Some(row) = self.state.remove_row(index) else {
            return;
        };
        let key = self.key_text(&row);
        if self.state.changed.remove(&key).is_some() {
            log::debug!("dropped queued change for deleted row {}", key);
        }
        self.context().set_form_changed(!self.state.changed.is_empty());
    }

    // =========================================================================
    // Inline editing
    // =========================================================================

    /// Opens the inline editor on a cell.
    ///
    /// Does nothing for tables without a table API, disabled columns, or
    /// when inline editing is off.
    pub async fn open_overlay(&mut self, index: usize, column: &str, anchor: Rect) -> Result<bool, Error> {
        let row = self.row(index)?.clone();
        let Some(col) = self.state.column(column).cloned() else {
            return Err(Error::InvalidAction(format!("no column '{}'", column)));
        };
        if self.state.options.table_api.is_none() || col.disabled || self.state.options.no_inline_editing {
            return Ok(false);
        }
        let overlay = OverlayState::open(index, &row, &col, &self.state.columns, anchor);
        if overlay.widget == Widget::Select {
            if let Some(lookup) = &overlay.lookup {
                self.resolver.load(lookup).await;
            }
        }
        self.state.overlay = Some(overlay);
        Ok(true)
    }

    /// Keeps the open inline editor inside `viewport`.
    pub fn reposition_overlay(&mut self, size: (f64, f64), viewport: Rect) {
        if let Some(overlay) = &mut self.state.overlay {
            overlay.reposition(size, viewport);
        }
    }

    /// Writes the inline editor's new value into the row and queues it.
    pub fn overlay_value_changed(&mut self, value: Value) -> Result<(), Error> {
        let overlay = self.state.overlay.as_mut().ok_or(Error::NotEditing)?;
        overlay.value = value;
        let overlay = overlay.clone();
        self.write_overlay(&overlay)?;
        self.context().set_form_changed(true);
        Ok(())
    }

    /// Updates the inline editor's pending value without touching the row.
    pub fn edit_overlay(&mut self, value: Value) -> Result<(), Error> {
        let overlay = self.state.overlay.as_mut().ok_or(Error::NotEditing)?;
        overlay.value = value;
        Ok(())
    }

    /// Closes the inline editor, writing and queuing a value that differs
    /// from the cell. Returns whether a change was queued.
    pub fn close_overlay(&mut self) -> Result<bool, Error> {
        let Some(overlay) = self.state.overlay.take() else {
            return Ok(false);
        };
        let current = self.row(overlay.row_index)?.value(&overlay.value_index);
        if current == overlay.value {
            return Ok(false);
        }
        self.write_overlay(&overlay)?;
        self.context().set_form_changed(true);
        Ok(true)
    }

    fn write_overlay(&mut self, overlay: &OverlayState) -> Result<(), Error> {
        let label = match (&overlay.lookup, &overlay.display_index) {
            (Some(lookup), Some(_)) => Some(Value::String(find_lookup_value(&overlay.value, lookup))),
            _ => None,
        };
        let row = self
            .state
            .rows
            .get_mut(overlay.row_index)
            .ok_or(Error::RowOutOfRange(overlay.row_index))?;
        if let (Some(label), Some(display)) = (label, &overlay.display_index) {
            if display != &overlay.value_index {
                row.set(display, label);
            }
        }
        row.set(&overlay.value_index, overlay.value.clone());

        let row = row.clone();
        let key = self.key_text(&row);
        let obj = row_to_object(&row, &self.state.columns);
        self.state.changed.insert(key, obj);
        Ok(())
    }

    // =========================================================================
    // Bulk save
    // =========================================================================

    /// PUTs every queued row. Saved rows leave the queue; failed ones stay
    /// for the next attempt. Returns how many were saved.
    pub async fn save_changed_rows(&mut self) -> Result<usize, Error> {
        let path = format!("Table/{}", self.table_api()?);
        let queued: Vec<(String, RowObject)> = self
            .state
            .changed
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut saved = 0;
        for (key, mut obj) in queued {
            if let Err(e) = prepare_row(&mut obj, &self.state.columns) {
                log::warn!("row {} not saved: {}", key, e);
                self.context().surface().show_error(&e.to_string()).await;
                continue;
            }
            if self.api.put(path.as_str(), Value::Object(obj)).await.is_some() {
                self.state.changed.remove(&key);
                saved += 1;
            }
        }

        self.context().set_form_changed(!self.state.changed.is_empty());
        if saved > 0 {
            self.mirror().await;
        }
        Ok(saved)
    }

    /// Drops queued inline changes and reloads the table.
    pub async fn undo_changes(&mut self) {
        self.state.changed.clear();
        self.state.overlay = None;
        self.context().set_form_changed(false);
        self.reload().await;
    }
}
