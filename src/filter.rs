// Category filters over loaded tables.
//
// Options are always derived from the raw table in hand, in the order
// values are first seen. Null is an option of its own so that selecting
// every option reproduces the table exactly.

use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::loader::EntityTables;
use crate::scope::EntityKind;
use crate::table::{Table, Value};

/// A distinct value of a category column.
///
/// Keyed by type as well as value: an integer 1, a real 1.0 and the text
/// "1" are three different categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Null,
    Integer(i64),
    /// Bit pattern of the value, with -0.0 folded into 0.0
    Real(u64),
    Text(String),
}

impl Category {
    pub fn new(value: impl Into<String>) -> Self {
        Category::Text(value.into())
    }

    pub fn null() -> Self {
        Category::Null
    }

    /// Category of a cell; a missing column counts as null
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Category::Null,
            Some(Value::Integer(i)) => Category::Integer(*i),
            Some(Value::Real(r)) => Category::Real(if *r == 0.0 { 0.0f64.to_bits() } else { r.to_bits() }),
            Some(Value::Text(s)) => Category::Text(s.clone()),
        }
    }

    /// Parse a user-supplied label; "(none)" selects null
    pub fn parse(label: &str) -> Self {
        if label == NULL_LABEL {
            Category::Null
        } else {
            Category::Text(label.to_string())
        }
    }
}

const NULL_LABEL: &str = "(none)";

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Null => f.write_str(NULL_LABEL),
            Category::Integer(i) => write!(f, "{}", i),
            Category::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Category::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Category::Null => serializer.serialize_none(),
            Category::Integer(i) => serializer.serialize_i64(*i),
            Category::Real(bits) => serializer.serialize_f64(f64::from_bits(*bits)),
            Category::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Distinct values of `column` in first-seen order; empty for an empty table
pub fn options_for(table: &Table, column: &str) -> Vec<Category> {
    let idx = table.column_index(column);
    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for row in table.rows() {
        let category = Category::of(idx.and_then(|i| row.get(i)));
        if seen.insert(category.clone()) {
            options.push(category);
        }
    }

    options
}

/// Rows whose `column` value is in `selected`. An empty selection yields an
/// empty table.
pub fn apply_filter(table: &Table, column: &str, selected: &HashSet<Category>) -> Table {
    let idx = table.column_index(column);
    table.retain_rows(|row| selected.contains(&Category::of(idx.and_then(|i| row.get(i)))))
}

/// Options and current selection for one entity's category filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFilter {
    pub entity: EntityKind,
    pub column: &'static str,
    pub options: Vec<Category>,
    #[serde(serialize_with = "serialize_selected")]
    selected: HashSet<Category>,
}

fn serialize_selected<S: Serializer>(
    selected: &HashSet<Category>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&Category> = selected.iter().collect();
    sorted.sort();
    serializer.collect_seq(sorted)
}

impl CategoryFilter {
    /// Filter over `table` with every option selected
    pub fn select_all(entity: EntityKind, table: &Table) -> Self {
        let column = entity.category_column();
        let options = options_for(table, column);
        let selected = options.iter().cloned().collect();
        Self {
            entity,
            column,
            options,
            selected,
        }
    }

    pub fn selected(&self) -> &HashSet<Category> {
        &self.selected
    }

    /// Selected categories in option order
    pub fn selected_in_order(&self) -> Vec<&Category> {
        self.options
            .iter()
            .filter(|c| self.selected.contains(c))
            .collect()
    }

    pub fn is_selected(&self, category: &Category) -> bool {
        self.selected.contains(category)
    }

    /// Replace the selection. Values not among the options are kept; they
    /// match nothing.
    pub fn set_selected(&mut self, selected: impl IntoIterator<Item = Category>) {
        self.selected = selected.into_iter().collect();
    }

    /// Flip one category in or out of the selection
    pub fn toggle(&mut self, category: &Category) {
        if !self.selected.remove(category) {
            self.selected.insert(category.clone());
        }
    }

    pub fn apply(&self, table: &Table) -> Table {
        apply_filter(table, self.column, &self.selected)
    }
}

/// The three independent filters of one loaded scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterState {
    pub organizations: CategoryFilter,
    pub individuals: CategoryFilter,
    pub vehicles: CategoryFilter,
}

impl FilterState {
    /// Default state for freshly loaded tables: everything selected
    pub fn defaults_for(tables: &EntityTables) -> Self {
        Self {
            organizations: CategoryFilter::select_all(EntityKind::Organization, &tables.organizations),
            individuals: CategoryFilter::select_all(EntityKind::Individual, &tables.individuals),
            vehicles: CategoryFilter::select_all(EntityKind::Vehicle, &tables.vehicles),
        }
    }

    pub fn get(&self, kind: EntityKind) -> &CategoryFilter {
        match kind {
            EntityKind::Organization => &self.organizations,
            EntityKind::Individual => &self.individuals,
            EntityKind::Vehicle => &self.vehicles,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut CategoryFilter {
        match kind {
            EntityKind::Organization => &mut self.organizations,
            EntityKind::Individual => &mut self.individuals,
            EntityKind::Vehicle => &mut self.vehicles,
        }
    }

    /// Apply each filter to its own table
    pub fn apply(&self, tables: &EntityTables) -> EntityTables {
        EntityTables {
            organizations: self.organizations.apply(&tables.organizations),
            individuals: self.individuals.apply(&tables.individuals),
            vehicles: self.vehicles.apply(&tables.vehicles),
        }
    }

    /// Selections keyed by category column, for logging and reports
    pub fn summary(&self) -> HashMap<&'static str, usize> {
        EntityKind::ALL
            .iter()
            .map(|k| (self.get(*k).column, self.get(*k).selected.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn individuals() -> Table {
        let mut table = Table::new(vec!["id".to_string(), "species".to_string()]);
        let species = ["Human", "Droid", "Human", "Human", "Droid", "Human", "Droid", "Human"];
        for (i, s) in species.iter().enumerate() {
            table.push_row(vec![Value::Integer(i as i64 + 1), (*s).into()]);
        }
        table.push_row(vec![Value::Integer(9), Value::Null]);
        table
    }

    fn set(labels: &[&str]) -> HashSet<Category> {
        labels.iter().map(|l| Category::parse(l)).collect()
    }

    #[test]
    fn test_options_in_first_seen_order() {
        let options = options_for(&individuals(), "species");
        assert_eq!(
            options,
            vec![Category::new("Human"), Category::new("Droid"), Category::null()]
        );
    }

    #[test]
    fn test_options_of_empty_table_are_empty() {
        assert!(options_for(&Table::empty(), "species").is_empty());
        assert!(options_for(&Table::new(vec!["species".to_string()]), "species").is_empty());
    }

    #[test]
    fn test_selecting_all_options_returns_table_unchanged() {
        let table = individuals();
        let all: HashSet<Category> = options_for(&table, "species").into_iter().collect();

        assert_eq!(apply_filter(&table, "species", &all), table);
    }

    #[test]
    fn test_empty_selection_returns_empty_table() {
        let filtered = apply_filter(&individuals(), "species", &HashSet::new());
        assert!(filtered.is_empty());
        assert_eq!(filtered.columns(), individuals().columns());
    }

    #[test]
    fn test_filter_keeps_matching_rows_only() {
        let filtered = apply_filter(&individuals(), "species", &set(&["Human"]));
        assert_eq!(filtered.len(), 5);

        let nulls = apply_filter(&individuals(), "species", &set(&["(none)"]));
        assert_eq!(nulls.len(), 1);
        assert_eq!(nulls.cell(0, "id"), Some(&Value::Integer(9)));
    }

    #[test]
    fn test_missing_column_treated_as_null() {
        let table = individuals();
        assert_eq!(options_for(&table, "manufacturer"), vec![Category::null()]);
        assert_eq!(apply_filter(&table, "manufacturer", &set(&["Human"])).len(), 0);
    }

    #[test]
    fn test_categories_are_keyed_by_type() {
        let mut table = Table::new(vec!["id".to_string(), "code".to_string()]);
        table.push_row(vec![Value::Integer(1), Value::Integer(1)]);
        table.push_row(vec![Value::Integer(2), "1".into()]);
        table.push_row(vec![Value::Integer(3), Value::Real(1.0)]);
        table.push_row(vec![Value::Integer(4), Value::Integer(1)]);

        let options = options_for(&table, "code");
        assert_eq!(options.len(), 3);
        assert_eq!(options[0], Category::Integer(1));
        assert_eq!(options[1], Category::new("1"));
        // all three still render with the same label
        assert!(options.iter().all(|c| c.to_string() == "1"));

        let text_only = apply_filter(&table, "code", &set(&["1"]));
        assert_eq!(text_only.len(), 1);
        assert_eq!(text_only.cell(0, "id"), Some(&Value::Integer(2)));

        let ints: HashSet<Category> = [Category::Integer(1)].into_iter().collect();
        assert_eq!(apply_filter(&table, "code", &ints).len(), 2);
    }

    #[test]
    fn test_category_serializes_with_its_type() {
        let json = serde_json::to_value(vec![
            Category::null(),
            Category::Integer(7),
            Category::of(Some(&Value::Real(2.5))),
            Category::new("Droid"),
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!([null, 7, 2.5, "Droid"]));
    }

    #[test]
    fn test_category_filter_toggle() {
        let mut filter = CategoryFilter::select_all(EntityKind::Individual, &individuals());
        assert_eq!(filter.apply(&individuals()).len(), 9);

        filter.toggle(&Category::new("Droid"));
        assert!(!filter.is_selected(&Category::new("Droid")));
        assert_eq!(filter.apply(&individuals()).len(), 6);
        assert_eq!(
            filter.selected_in_order(),
            vec![&Category::new("Human"), &Category::null()]
        );

        filter.toggle(&Category::new("Droid"));
        assert_eq!(filter.apply(&individuals()).len(), 9);
    }

    #[test]
    fn test_filters_are_independent_per_entity() {
        let tables = EntityTables {
            organizations: Table::empty(),
            individuals: individuals(),
            vehicles: Table::empty(),
        };
        let mut state = FilterState::defaults_for(&tables);
        state
            .get_mut(EntityKind::Vehicle)
            .set_selected(Vec::<Category>::new());

        let filtered = state.apply(&tables);
        assert_eq!(filtered.individuals, tables.individuals);
        assert!(state.get(EntityKind::Organization).options.is_empty());
        assert_eq!(state.summary()["species"], 3);
    }
}
