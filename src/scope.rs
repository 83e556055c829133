// Scope resolution: turn a franchise selection into the fixed set of
// entity queries.
//
// Both scopes go through the same builder. The only differences are the
// optional `franchise_id = ?1` predicate (always a bound parameter) and
// whether the franchise name is joined in for display.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Which rows are in play: one franchise or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    AllFranchises,
    Franchise(i64),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::AllFranchises => f.write_str("all franchises"),
            Selection::Franchise(id) => write!(f, "franchise {}", id),
        }
    }
}

/// The kind of read a cache entry or load error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// The three entity queries of one scope, loaded as a unit
    EntityBatch,
    /// The franchise list feeding the selector
    FranchiseList,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::EntityBatch => f.write_str("entity data"),
            QueryKind::FranchiseList => f.write_str("franchise list"),
        }
    }
}

/// The three entity types shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Individual,
    Vehicle,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Organization,
        EntityKind::Individual,
        EntityKind::Vehicle,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organizations",
            EntityKind::Individual => "individuals",
            EntityKind::Vehicle => "vehicles",
        }
    }

    fn alias(&self) -> &'static str {
        match self {
            EntityKind::Organization => "o",
            EntityKind::Individual => "i",
            EntityKind::Vehicle => "v",
        }
    }

    /// Column used for filtering and grouping
    pub fn category_column(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization_type",
            EntityKind::Individual => "species",
            EntityKind::Vehicle => "manufacturer",
        }
    }

    /// Parse a table name or category column ("vehicles", "manufacturer", ...)
    pub fn parse(name: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|kind| {
            name.eq_ignore_ascii_case(kind.table()) || name.eq_ignore_ascii_case(kind.category_column())
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Column aliases added by the joins
pub const FRANCHISE_NAME_COLUMN: &str = "franchise_name";
pub const COMMANDER_NAME_COLUMN: &str = "commander_name";

pub const FRANCHISE_LIST_SQL: &str = "SELECT id, name FROM franchises ORDER BY name";

/// One read-only query with its bound parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub sql: String,
    pub params: Vec<i64>,
}

impl QuerySpec {
    pub fn franchise_list() -> Self {
        Self {
            sql: FRANCHISE_LIST_SQL.to_string(),
            params: Vec::new(),
        }
    }
}

/// Build the query for one entity type.
///
/// `franchise_id` adds the equality predicate on the base table,
/// `denormalize_franchise` left-joins the franchise name. Vehicles always
/// resolve `commander_name` through commanders -> individuals.
pub fn entity_query(
    kind: EntityKind,
    franchise_id: Option<i64>,
    denormalize_franchise: bool,
) -> QuerySpec {
    let a = kind.alias();
    let mut select = vec![format!("{}.*", a)];
    let mut joins = Vec::new();

    if kind == EntityKind::Vehicle {
        select.push(format!("cmd_ind.name AS {}", COMMANDER_NAME_COLUMN));
        joins.push(format!("LEFT JOIN commanders c ON {}.commander_id = c.id", a));
        joins.push("LEFT JOIN individuals cmd_ind ON c.individual_id = cmd_ind.id".to_string());
    }

    if denormalize_franchise {
        select.push(format!("f.name AS {}", FRANCHISE_NAME_COLUMN));
        joins.push(format!("LEFT JOIN franchises f ON {}.franchise_id = f.id", a));
    }

    let mut sql = format!("SELECT {} FROM {} {}", select.join(", "), kind.table(), a);
    for join in &joins {
        sql.push(' ');
        sql.push_str(join);
    }

    let mut params = Vec::new();
    if let Some(id) = franchise_id {
        sql.push_str(&format!(" WHERE {}.franchise_id = ?1", a));
        params.push(id);
    }
    sql.push_str(&format!(" ORDER BY {}.id", a));

    QuerySpec { sql, params }
}

/// The three entity queries for one selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeQuery {
    pub selection: Selection,
    pub organizations: QuerySpec,
    pub individuals: QuerySpec,
    pub vehicles: QuerySpec,
}

impl ScopeQuery {
    pub fn query(&self, kind: EntityKind) -> &QuerySpec {
        match kind {
            EntityKind::Organization => &self.organizations,
            EntityKind::Individual => &self.individuals,
            EntityKind::Vehicle => &self.vehicles,
        }
    }

    /// Hex SHA-256 over the query texts and parameters.
    ///
    /// Part of the cache key, so a change to the query set never serves
    /// rows produced by an older query.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for kind in EntityKind::ALL {
            hash_query(&mut hasher, self.query(kind));
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Resolve a selection into its query set. Pure; never touches the store.
pub fn resolve(selection: Selection) -> ScopeQuery {
    let (franchise_id, denormalize) = match selection {
        Selection::AllFranchises => (None, true),
        Selection::Franchise(id) => (Some(id), false),
    };

    ScopeQuery {
        selection,
        organizations: entity_query(EntityKind::Organization, franchise_id, denormalize),
        individuals: entity_query(EntityKind::Individual, franchise_id, denormalize),
        vehicles: entity_query(EntityKind::Vehicle, franchise_id, denormalize),
    }
}

/// Hex SHA-256 of a single query, used for the franchise-list cache key
pub fn fingerprint_of(spec: &QuerySpec) -> String {
    let mut hasher = Sha256::new();
    hash_query(&mut hasher, spec);
    format!("{:x}", hasher.finalize())
}

fn hash_query(hasher: &mut Sha256, spec: &QuerySpec) {
    hasher.update(spec.sql.as_bytes());
    for p in &spec.params {
        hasher.update(p.to_le_bytes());
    }
}
