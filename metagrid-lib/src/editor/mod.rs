//! Row editing state
//!
//! [`RowEditor`] holds the add/edit form state, [`OverlayState`] the inline
//! cell editor and [`ChangedRows`] the rows edited inline but not yet saved.
//! The functions in [`prepare`] convert between table rows and the
//! named-property objects the form works on.

mod changes;
mod overlay;
pub mod prepare;

use serde_json::Value;

pub use changes::ChangedRows;
pub use overlay::MIN_WIDE_WIDTH;
pub use overlay::OverlayState;
pub use overlay::Rect;
pub use overlay::Widget;
pub use prepare::apply_save_result;
pub use prepare::clear_server_stamps;
pub use prepare::create_empty_row;
pub use prepare::create_row_for_table;
pub use prepare::edit_snapshot;
pub use prepare::prepare_row;
pub use prepare::row_to_object;
pub use prepare::validate_row;

use crate::error::Error;
use crate::model::RowObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Add,
    Edit,
}

/// The row being added or edited, decoupled from the table encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EditingState {
    pub mode: EditMode,
    pub row: RowObject,
    /// Table position of the edited row. `None` while adding.
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    Idle,
    Adding,
    Editing,
}

/// Add/edit state machine.
///
/// `Idle -> Adding | Editing` on `begin_*`, back to `Idle` on `finish` or
/// `cancel`. Beginning while not idle replaces the current form.
#[derive(Debug, Clone, Default)]
pub struct RowEditor {
    editing: Option<EditingState>,
}

impl RowEditor {
    /// Creates an idle editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the form.
    pub fn phase(&self) -> EditorPhase {
        match &self.editing {
            None => EditorPhase::Idle,
            Some(state) if state.mode == EditMode::Add => EditorPhase::Adding,
            Some(_) => EditorPhase::Editing,
        }
    }

    /// The row being edited, if any.
    pub fn editing(&self) -> Option<&EditingState> {
        self.editing.as_ref()
    }

    /// Opens the form on a new row.
    pub fn begin_add(&mut self, row: RowObject) {
        if self.editing.is_some() {
            log::debug!("discarding open form for a new row");
        }
        self.editing = Some(EditingState {
            mode: EditMode::Add,
            row,
            index: None,
        });
    }

    /// Opens the form on a snapshot of row `index`.
    pub fn begin_edit(&mut self, index: usize, row: RowObject) {
        self.editing = Some(EditingState {
            mode: EditMode::Edit,
            row,
            index: Some(index),
        });
    }

    /// Sets one field of the open form.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let state = self.editing.as_mut().ok_or(Error::NotEditing)?;
        state.row.insert(name.to_string(), value);
        Ok(())
    }

    /// Writes named properties into the open form.
    pub fn update(&mut self, props: &RowObject) -> Result<(), Error> {
        let state = self.editing.as_mut().ok_or(Error::NotEditing)?;
        for (key, value) in props {
            state.row.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Closes the form after a successful save.
    pub fn finish(&mut self) -> Option<EditingState> {
        self.editing.take()
    }

    /// Discards the form.
    pub fn cancel(&mut self) -> Option<EditingState> {
        self.editing.take()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_phases() {
        let mut editor = RowEditor::new();
        assert_eq!(editor.phase(), EditorPhase::Idle);
        assert!(matches!(editor.set_field("a", json!(1)), Err(Error::NotEditing)));

        editor.begin_add(RowObject::new());
        assert_eq!(editor.phase(), EditorPhase::Adding);
        editor.set_field("name", json!("x")).unwrap();
        assert_eq!(editor.editing().unwrap().row["name"], json!("x"));

        editor.begin_edit(3, RowObject::new());
        assert_eq!(editor.phase(), EditorPhase::Editing);
        assert_eq!(editor.editing().unwrap().index, Some(3));

        assert!(editor.cancel().is_some());
        assert_eq!(editor.phase(), EditorPhase::Idle);
        assert!(editor.finish().is_none());
    }

    #[test]
    fn test_update_merges_props() {
        let mut editor = RowEditor::new();
        let mut row = RowObject::new();
        row.insert("a".into(), json!(1));
        editor.begin_edit(0, row);

        let props = json!({"b": 2, "a": 3}).as_object().cloned().unwrap();
        editor.update(&props).unwrap();
        assert_eq!(Value::Object(editor.editing().unwrap().row.clone()), json!({"a": 3, "b": 2}));
    }
}
