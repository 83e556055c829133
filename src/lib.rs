// Franchise Dashboard - Core Library
// Query, filter and aggregate pipeline behind the franchise reporting dashboard

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod import;
pub mod loader;
pub mod scope;
pub mod table;

// Re-export commonly used types
pub use aggregate::{count_rows, proportions, value_counts, CategoryCount, CategoryShare};
pub use cache::{CacheKey, CachedResult, QueryCache, DEFAULT_TTL};
pub use config::DashboardConfig;
pub use dashboard::{
    Chart, ChartKind, Dashboard, DashboardView, EntityPanel, FilterView, Kpi, PanelContent,
    Selector, SelectorOption, ALL_FRANCHISES_LABEL,
};
pub use db::{setup_database, DataSource, SqliteSource};
pub use error::{LoadError, SourceError};
pub use export::write_csv;
pub use filter::{apply_filter, options_for, Category, CategoryFilter, FilterState};
pub use import::{import_dir, ImportSummary};
pub use loader::{EntityTables, Franchise, FranchiseListOutcome, LoadOutcome, Loader};
pub use scope::{resolve, EntityKind, QueryKind, QuerySpec, ScopeQuery, Selection};
pub use table::{Table, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
