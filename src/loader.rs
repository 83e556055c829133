// Loader: runs a scope's queries through the data source, behind the
// injected cache, and turns any failure into empty results plus one
// reported error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CachedResult, QueryCache};
use crate::db::DataSource;
use crate::error::{LoadError, SourceError};
use crate::scope::{self, EntityKind, QueryKind, QuerySpec, ScopeQuery, Selection};
use crate::table::Table;

/// One entry of the franchise selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Franchise {
    pub id: i64,
    pub name: String,
}

/// Raw tables of one scope
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EntityTables {
    pub organizations: Table,
    pub individuals: Table,
    pub vehicles: Table,
}

impl EntityTables {
    pub fn get(&self, kind: EntityKind) -> &Table {
        match kind {
            EntityKind::Organization => &self.organizations,
            EntityKind::Individual => &self.individuals,
            EntityKind::Vehicle => &self.vehicles,
        }
    }
}

/// Result of `Loader::load`; `error` is set only when the load failed
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub selection: Selection,
    pub tables: EntityTables,
    pub error: Option<LoadError>,
    pub loaded_at: DateTime<Utc>,
}

impl LoadOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of `Loader::load_franchise_list`
#[derive(Debug, Clone, PartialEq)]
pub struct FranchiseListOutcome {
    pub franchises: Vec<Franchise>,
    pub error: Option<LoadError>,
}

pub struct Loader<S> {
    source: S,
    cache: Arc<QueryCache>,
}

impl<S: DataSource> Loader<S> {
    pub fn new(source: S, cache: Arc<QueryCache>) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the three entity tables for `selection`.
    ///
    /// All three queries succeed or the whole load fails; a failure never
    /// leaves partial data behind and is not cached.
    pub fn load(&self, selection: Selection) -> LoadOutcome {
        let scope_query = scope::resolve(selection);
        let key = CacheKey::new(selection, QueryKind::EntityBatch, scope_query.fingerprint());

        if let Some(CachedResult::Entities { tables, loaded_at }) = self.cache.get(&key) {
            debug!(%selection, %loaded_at, "entity data served from cache");
            return LoadOutcome {
                selection,
                tables,
                error: None,
                loaded_at,
            };
        }

        match self.fetch(&scope_query) {
            Ok(tables) => {
                info!(
                    %selection,
                    organizations = tables.organizations.len(),
                    individuals = tables.individuals.len(),
                    vehicles = tables.vehicles.len(),
                    "loaded entity data"
                );
                let loaded_at = Utc::now();
                self.cache.insert(
                    key,
                    CachedResult::Entities {
                        tables: tables.clone(),
                        loaded_at,
                    },
                );
                LoadOutcome {
                    selection,
                    tables,
                    error: None,
                    loaded_at,
                }
            }
            Err(source) => {
                let error = LoadError::new(selection, QueryKind::EntityBatch, source);
                warn!(%selection, %error, "entity load failed");
                LoadOutcome {
                    selection,
                    tables: EntityTables::default(),
                    error: Some(error),
                    loaded_at: Utc::now(),
                }
            }
        }
    }

    /// Load all franchises ordered by name
    pub fn load_franchise_list(&self) -> FranchiseListOutcome {
        let spec = QuerySpec::franchise_list();
        let key = CacheKey::new(
            Selection::AllFranchises,
            QueryKind::FranchiseList,
            scope::fingerprint_of(&spec),
        );

        if let Some(CachedResult::Franchises(franchises)) = self.cache.get(&key) {
            debug!("franchise list served from cache");
            return FranchiseListOutcome {
                franchises,
                error: None,
            };
        }

        match self.run(&spec).and_then(|table| franchises_from(&table)) {
            Ok(franchises) => {
                info!(count = franchises.len(), "loaded franchise list");
                self.cache.insert(key, CachedResult::Franchises(franchises.clone()));
                FranchiseListOutcome {
                    franchises,
                    error: None,
                }
            }
            Err(source) => {
                let error = LoadError::new(Selection::AllFranchises, QueryKind::FranchiseList, source);
                warn!(%error, "franchise list load failed");
                FranchiseListOutcome {
                    franchises: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }

    /// Run the three entity queries in order, stopping at the first failure
    fn fetch(&self, scope_query: &ScopeQuery) -> Result<EntityTables, SourceError> {
        Ok(EntityTables {
            organizations: self.run(scope_query.query(EntityKind::Organization))?,
            individuals: self.run(scope_query.query(EntityKind::Individual))?,
            vehicles: self.run(scope_query.query(EntityKind::Vehicle))?,
        })
    }

    fn run(&self, spec: &QuerySpec) -> Result<Table, SourceError> {
        self.source.query(&spec.sql, &spec.params)
    }
}

fn franchises_from(table: &Table) -> Result<Vec<Franchise>, SourceError> {
    table
        .records()
        .map(|record| {
            let id = record
                .get("id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| SourceError::Query("franchise row without integer id".to_string()))?;
            let name = record
                .get("name")
                .map(|v| v.to_string())
                .ok_or_else(|| SourceError::Query("franchise row without name".to_string()))?;
            Ok(Franchise { id, name })
        })
        .collect()
}
