//! Inline cell editor

use std::sync::Arc;

use serde_json::Value;

use crate::model::Column;
use crate::model::ColumnIndex;
use crate::model::ColumnType;
use crate::model::Lookup;
use crate::model::Row;

/// Minimum anchor width of the wide widgets.
pub const MIN_WIDE_WIDTH: f64 = 400.0;

/// Editor widget picked from the column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Input,
    Select,
    Json,
    Text,
    Icon,
}

impl Widget {
    /// Picks the widget for editing `column`.
    pub fn for_column(column: &Column) -> Self {
        match column.column_type {
            ColumnType::Json => Self::Json,
            ColumnType::Icon => Self::Icon,
            ColumnType::Text => Self::Text,
            _ if column.lookup.is_some() => Self::Select,
            _ => Self::Input,
        }
    }

    /// Widgets that need at least the minimum overlay width.
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::Json | Self::Text | Self::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// A rectangle at `(x, y)`.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// An open inline editor over one cell.
///
/// For a lookup column the value index points at the id cell and the display
/// index at the label cell, so selecting an option updates both.
#[derive(Debug, Clone)]
pub struct OverlayState {
    pub row_index: usize,
    pub column: String,
    pub widget: Widget,
    pub anchor: Rect,
    pub value_index: ColumnIndex,
    pub display_index: Option<ColumnIndex>,
    pub lookup: Option<Arc<Lookup>>,
    /// Cell value when the overlay opened.
    pub original: Value,
    pub value: Value,
}

impl OverlayState {
    /// Opens an editor on `column` of `row`.
    pub fn open(row_index: usize, row: &Row, column: &Column, columns: &[Column], anchor: Rect) -> Self {
        let widget = Widget::for_column(column);
        let mut anchor = anchor;
        if widget.is_wide() {
            anchor.width = anchor.width.max(MIN_WIDE_WIDTH);
        }

        let (value_index, display_index) = match &column.lookup {
            Some(lookup) if column.display => {
                let id_name = format!("{}_id", lookup.name);
                let value_index = columns
                    .iter()
                    .find(|c| c.name == id_name)
                    .map(|c| c.index.clone())
                    .unwrap_or_else(|| column.index.clone());
                (value_index, Some(column.index.clone()))
            }
            Some(_) => {
                let val_name = format!("{}_val", column.name);
                let display = columns.iter().find(|c| c.name == val_name).map(|c| c.index.clone());
                (column.index.clone(), display)
            }
            None => (column.index.clone(), None),
        };

        let original = row.value(&value_index);
        Self {
            row_index,
            column: column.name.clone(),
            widget,
            anchor,
            value_index,
            display_index,
            lookup: column.lookup.clone(),
            value: original.clone(),
            original,
        }
    }

    /// Whether the pending value differs from the cell it was opened on.
    pub fn is_changed(&self) -> bool {
        self.value != self.original
    }

    /// Moves the anchor so an overlay of `size` stays inside `viewport`.
    pub fn reposition(&mut self, size: (f64, f64), viewport: Rect) {
        let (width, height) = size;
        let max_x = viewport.x + viewport.width - width;
        let max_y = viewport.y + viewport.height - height;
        self.anchor.x = self.anchor.x.min(max_x).max(viewport.x);
        self.anchor.y = self.anchor.y.min(max_y).max(viewport.y);
    }
}
