//! Metadata-driven table engine
//!
//! Turns a column/row dataset fetched from a backend into an editable table:
//! inferred and overridden column models, lazily resolved lookups, inline and
//! overlay editing, declarative row and table actions, and an offline cache
//! for table reads.

pub mod action;
pub mod api;
pub mod cache;
pub mod columns;
pub mod context;
pub mod editor;
pub mod error;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod statistics;
pub mod store;
pub mod surface;
pub mod table;
pub mod transport;

pub use action::Action;
pub use action::ActionDescriptor;
pub use api::Api;
pub use cache::RemoteCache;
pub use columns::ColumnModel;
pub use context::AppContext;
pub use context::RouteDef;
pub use editor::RowEditor;
pub use error::Error;
pub use resolver::LookupResolver;
pub use response::CacheStatus;
pub use response::Response;
pub use store::LocalStore;
pub use surface::Surface;
pub use table::TableController;
pub use table::TableOptions;
pub use transport::Transport;
