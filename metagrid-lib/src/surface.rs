//! User-facing surface the engine reports to
//!
//! Dialogs, navigation, popups and charts are rendered by the host
//! application. The engine only describes what to show.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::model::RowObject;

/// Navigation to another view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRequest {
    pub path: String,
    pub name: Option<String>,
    pub component: Option<String>,
    /// View properties: the substituted descriptor plus row context.
    pub props: RowObject,
}

/// A declarative popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupRequest {
    /// Popup slot, `default` unless the action names one.
    pub name: String,
    pub props: RowObject,
}

/// Data published to the chart display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRequest {
    /// The action's `chart` descriptor.
    pub props: RowObject,
    pub data: Vec<RowObject>,
}

/// Host UI hooks.
///
/// # Example
///
/// ```ignore
/// struct Console;
///
/// #[async_trait]
/// impl Surface for Console {
///     async fn confirm(&self, message: &str) -> bool {
///         println!("{} [y/N]", message);
///         read_yes()
///     }
///     async fn show_message(&self, message: &str) { println!("{}", message) }
///     async fn show_error(&self, message: &str) { eprintln!("{}", message) }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Surface: Send + Sync {
    /// Asks the user a yes/no question.
    async fn confirm(&self, message: &str) -> bool;

    async fn show_message(&self, message: &str);

    async fn show_error(&self, message: &str);

    async fn navigate(&self, request: RouteRequest);

    async fn open_popup(&self, request: PopupRequest);

    async fn show_chart(&self, request: ChartRequest);

    /// Tracks a long-running server task.
    async fn show_progress(&self, task_id: &Value);

    async fn open_url(&self, url: &str);

    /// Ends the session; the host re-authenticates.
    async fn logout(&self);
}
