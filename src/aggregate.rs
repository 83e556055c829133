// Counts for KPIs and chart tallies

use serde::Serialize;
use std::collections::HashMap;

use crate::filter::Category;
use crate::table::Table;

/// One bar or slice: a category and how many rows carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

pub fn count_rows(table: &Table) -> usize {
    table.len()
}

/// Group rows by `column` and count them, largest group first.
///
/// Groups with equal counts keep the order in which their value first
/// appears in the table. An empty table yields no groups.
pub fn value_counts(table: &Table, column: &str) -> Vec<CategoryCount> {
    let idx = table.column_index(column);
    let mut positions: HashMap<Category, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for row in table.rows() {
        let category = Category::of(idx.and_then(|i| row.get(i)));
        match positions.get(&category).copied() {
            Some(pos) => counts[pos].count += 1,
            None => {
                positions.insert(category.clone(), counts.len());
                counts.push(CategoryCount { category, count: 1 });
            }
        }
    }

    // sort_by is stable, so ties stay in first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// A slice of the proportion breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub share: f64,
}

/// Share of each group in the total, for the proportion breakdown
pub fn proportions(counts: &[CategoryCount]) -> Vec<CategoryShare> {
    let total: usize = counts.iter().map(|c| c.count).sum();
    if total == 0 {
        return Vec::new();
    }
    counts
        .iter()
        .map(|c| CategoryShare {
            category: c.category.clone(),
            share: c.count as f64 / total as f64,
        })
        .collect()
}
