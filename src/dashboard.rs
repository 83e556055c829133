// Dashboard: one pipeline pass per interaction, producing the view model
// the presentation layer renders.
//
// selection -> loader (cached) -> raw tables -> filters -> filtered tables
// -> counts and tallies. Changing the selection always resets the filters
// to "everything selected".

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{count_rows, proportions, value_counts, CategoryCount, CategoryShare};
use crate::db::DataSource;
use crate::error::LoadError;
use crate::filter::{Category, CategoryFilter, FilterState};
use crate::loader::{EntityTables, Franchise, Loader};
use crate::scope::{EntityKind, Selection};
use crate::table::Table;

pub const ALL_FRANCHISES_LABEL: &str = "All franchises";
pub const NO_FRANCHISES_NOTICE: &str = "No franchises found in the database.";

/// Display text for one entity type
struct Labels {
    heading: &'static str,
    kpi: &'static str,
    filter: &'static str,
    chart_title: &'static str,
    chart: ChartKind,
    empty: &'static str,
}

fn labels(kind: EntityKind) -> Labels {
    match kind {
        EntityKind::Organization => Labels {
            heading: "Organizations",
            kpi: "Organizations found",
            filter: "Filter by organization type",
            chart_title: "Organization types (filtered)",
            chart: ChartKind::Pie,
            empty: "No organizations found with the current filters.",
        },
        EntityKind::Individual => Labels {
            heading: "Individuals",
            kpi: "Individuals found",
            filter: "Filter by species",
            chart_title: "Count by species (filtered)",
            chart: ChartKind::Bar,
            empty: "No individuals found with the current filters.",
        },
        EntityKind::Vehicle => Labels {
            heading: "Vehicles",
            kpi: "Vehicles found",
            filter: "Filter by manufacturer",
            chart_title: "Vehicles by manufacturer (filtered)",
            chart: ChartKind::Bar,
            empty: "No vehicles found with the current filters.",
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Proportion breakdown
    Pie,
    /// Tally per category
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorOption {
    pub label: String,
    pub selection: Selection,
}

/// Franchise selector: "All franchises" first, then franchises by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selector {
    pub options: Vec<SelectorOption>,
    pub selected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: &'static str,
    pub category_column: &'static str,
    pub data: Vec<CategoryCount>,
    /// Share of each group, filled for pie charts only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<CategoryShare>,
}

/// A panel shows a chart only when the filtered table has rows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelContent {
    Chart(Chart),
    NoData { message: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPanel {
    pub entity: EntityKind,
    pub heading: &'static str,
    pub kpi: Kpi,
    pub content: PanelContent,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterView {
    pub label: &'static str,
    #[serde(flatten)]
    pub filter: CategoryFilter,
}

/// Everything the presentation layer needs for one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub selector: Selector,
    pub filters: Vec<FilterView>,
    pub panels: Vec<EntityPanel>,
    pub errors: Vec<String>,
    pub notice: Option<&'static str>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl DashboardView {
    pub fn panel(&self, kind: EntityKind) -> Option<&EntityPanel> {
        self.panels.iter().find(|p| p.entity == kind)
    }

    pub fn kpis(&self) -> Vec<usize> {
        self.panels.iter().map(|p| p.kpi.value).collect()
    }
}

pub struct Dashboard<S> {
    loader: Loader<S>,
    franchises: Vec<Franchise>,
    list_error: Option<LoadError>,
    selection: Selection,
    raw: EntityTables,
    filters: FilterState,
    load_error: Option<LoadError>,
    loaded_at: Option<DateTime<Utc>>,
}

impl<S: DataSource> Dashboard<S> {
    /// Load the franchise list and the default "all franchises" scope
    pub fn open(loader: Loader<S>) -> Self {
        let list = loader.load_franchise_list();
        let raw = EntityTables::default();
        let filters = FilterState::defaults_for(&raw);

        let mut dashboard = Self {
            loader,
            franchises: list.franchises,
            list_error: list.error,
            selection: Selection::AllFranchises,
            raw,
            filters,
            load_error: None,
            loaded_at: None,
        };
        dashboard.select(Selection::AllFranchises);
        dashboard
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Switch scope: reload (through the cache) and reset every filter.
    ///
    /// With an empty franchise list nothing is loaded.
    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;

        if self.franchises.is_empty() {
            self.raw = EntityTables::default();
            self.load_error = None;
            self.loaded_at = None;
        } else {
            let outcome = self.loader.load(selection);
            self.raw = outcome.tables;
            self.load_error = outcome.error;
            self.loaded_at = Some(outcome.loaded_at);
        }

        self.filters = FilterState::defaults_for(&self.raw);
        info!(%selection, filters = ?self.filters.summary(), "scope selected");
    }

    /// Select by selector label; `None` if no option carries that label
    pub fn select_label(&mut self, label: &str) -> Option<Selection> {
        let selection = self
            .selector()
            .options
            .into_iter()
            .find(|o| o.label == label)
            .map(|o| o.selection)?;
        self.select(selection);
        Some(selection)
    }

    pub fn set_filter(&mut self, kind: EntityKind, selected: impl IntoIterator<Item = Category>) {
        self.filters.get_mut(kind).set_selected(selected);
    }

    pub fn toggle(&mut self, kind: EntityKind, category: &Category) {
        self.filters.get_mut(kind).toggle(category);
    }

    pub fn filtered_tables(&self) -> EntityTables {
        self.filters.apply(&self.raw)
    }

    pub fn selector(&self) -> Selector {
        let mut options = vec![SelectorOption {
            label: ALL_FRANCHISES_LABEL.to_string(),
            selection: Selection::AllFranchises,
        }];
        options.extend(self.franchises.iter().map(|f| SelectorOption {
            label: f.name.clone(),
            selection: Selection::Franchise(f.id),
        }));

        let selected = options
            .iter()
            .position(|o| o.selection == self.selection)
            .unwrap_or(0);

        Selector { options, selected }
    }

    /// Label of the current selection
    pub fn selected_label(&self) -> String {
        match self.selection {
            Selection::AllFranchises => ALL_FRANCHISES_LABEL.to_string(),
            Selection::Franchise(id) => self
                .franchises
                .iter()
                .find(|f| f.id == id)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| self.selection.to_string()),
        }
    }

    /// Run filters and aggregation over the loaded tables
    pub fn view(&self) -> DashboardView {
        let filtered = self.filtered_tables();

        let filters = EntityKind::ALL
            .iter()
            .map(|kind| FilterView {
                label: labels(*kind).filter,
                filter: self.filters.get(*kind).clone(),
            })
            .collect();

        let panels = EntityKind::ALL
            .iter()
            .map(|kind| build_panel(*kind, filtered.get(*kind)))
            .collect();

        let errors = self
            .list_error
            .iter()
            .chain(self.load_error.iter())
            .map(|e| e.user_message())
            .collect();

        DashboardView {
            title: format!("Overview: {}", self.selected_label()),
            selector: self.selector(),
            filters,
            panels,
            errors,
            notice: self.franchises.is_empty().then_some(NO_FRANCHISES_NOTICE),
            loaded_at: self.loaded_at,
        }
    }
}

fn build_panel(kind: EntityKind, table: &Table) -> EntityPanel {
    let l = labels(kind);
    let column = kind.category_column();

    let content = if table.is_empty() {
        PanelContent::NoData { message: l.empty }
    } else {
        let data = value_counts(table, column);
        let shares = match l.chart {
            ChartKind::Pie => proportions(&data),
            ChartKind::Bar => Vec::new(),
        };
        PanelContent::Chart(Chart {
            kind: l.chart,
            title: l.chart_title,
            category_column: column,
            data,
            shares,
        })
    };

    EntityPanel {
        entity: kind,
        heading: l.heading,
        kpi: Kpi {
            label: l.kpi,
            value: count_rows(table),
        },
        content,
        table: table.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::db::{setup_database, SqliteSource};
    use crate::error::SourceError;
    use crate::loader::tests::CountingSource;
    use rusqlite::Connection;
    use std::sync::Arc;

    fn dashboard(source: CountingSource) -> Dashboard<CountingSource> {
        Dashboard::open(Loader::new(source, Arc::new(QueryCache::default())))
    }

    fn chart(view: &DashboardView, kind: EntityKind) -> Option<&Chart> {
        match &view.panel(kind)?.content {
            PanelContent::Chart(chart) => Some(chart),
            PanelContent::NoData { .. } => None,
        }
    }

    #[test]
    fn test_selector_lists_all_first_and_selects_it() {
        let dash = dashboard(CountingSource::new());
        let selector = dash.view().selector;

        let labels: Vec<&str> = selector.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["All franchises", "Alpha", "Beta"]);
        assert_eq!(selector.selected, 0);
        assert_eq!(dash.selection(), Selection::AllFranchises);
    }

    #[test]
    fn test_franchise_without_vehicles_shows_no_data() {
        let mut dash = dashboard(CountingSource::new());
        assert_eq!(dash.select_label("Alpha"), Some(Selection::Franchise(1)));

        let view = dash.view();
        let vehicles = view.panel(EntityKind::Vehicle).unwrap();

        assert_eq!(view.title, "Overview: Alpha");
        assert_eq!(vehicles.kpi.value, 0);
        assert_eq!(
            vehicles.content,
            PanelContent::NoData {
                message: "No vehicles found with the current filters."
            }
        );
        assert!(view.errors.is_empty());
    }

    #[test]
    fn test_unknown_label_keeps_selection() {
        let mut dash = dashboard(CountingSource::new());
        dash.select(Selection::Franchise(2));
        let calls = dash.loader.source().calls();

        assert_eq!(dash.select_label("Gamma"), None);
        assert_eq!(dash.selection(), Selection::Franchise(2));
        assert_eq!(dash.loader.source().calls(), calls);
        assert_eq!(dash.view().title, "Overview: Beta");
    }

    #[test]
    fn test_default_filters_show_all_species() {
        let mut dash = dashboard(CountingSource::new());
        dash.select(Selection::Franchise(1));

        let view = dash.view();
        let species = chart(&view, EntityKind::Individual).unwrap();

        assert_eq!(species.kind, ChartKind::Bar);
        assert_eq!(
            species.data,
            vec![
                CategoryCount { category: Category::new("Human"), count: 5 },
                CategoryCount { category: Category::new("Droid"), count: 3 },
            ]
        );
        assert_eq!(view.panel(EntityKind::Individual).unwrap().kpi.value, 8);
    }

    #[test]
    fn test_deselecting_species_removes_it_from_counts() {
        let mut dash = dashboard(CountingSource::new());
        dash.select(Selection::Franchise(1));

        dash.toggle(EntityKind::Individual, &Category::new("Droid"));
        let view = dash.view();

        assert_eq!(view.panel(EntityKind::Individual).unwrap().kpi.value, 5);
        let species = chart(&view, EntityKind::Individual).unwrap();
        assert_eq!(
            species.data,
            vec![CategoryCount { category: Category::new("Human"), count: 5 }]
        );
        // other entities are untouched
        assert_eq!(view.panel(EntityKind::Organization).unwrap().kpi.value, 2);
    }

    #[test]
    fn test_empty_selection_hides_chart() {
        let mut dash = dashboard(CountingSource::new());

        dash.set_filter(EntityKind::Organization, Vec::new());
        let view = dash.view();

        assert_eq!(view.panel(EntityKind::Organization).unwrap().kpi.value, 0);
        assert!(chart(&view, EntityKind::Organization).is_none());
        assert_eq!(view.panel(EntityKind::Individual).unwrap().kpi.value, 9);
    }

    #[test]
    fn test_changing_scope_resets_filters() {
        let mut dash = dashboard(CountingSource::new());
        dash.select(Selection::Franchise(1));
        dash.toggle(EntityKind::Individual, &Category::new("Droid"));

        dash.select(Selection::Franchise(2));
        let filter = dash.filters().get(EntityKind::Individual);
        assert_eq!(filter.options, vec![Category::new("Human")]);
        assert!(filter.is_selected(&Category::new("Human")));

        dash.select(Selection::Franchise(1));
        assert!(dash
            .filters()
            .get(EntityKind::Individual)
            .is_selected(&Category::new("Droid")));
        assert_eq!(dash.view().kpis(), vec![2, 8, 0]);
    }

    #[test]
    fn test_organization_breakdown_is_pie() {
        let dash = dashboard(CountingSource::new());
        let view = dash.view();
        let orgs = chart(&view, EntityKind::Organization).unwrap();

        assert_eq!(orgs.kind, ChartKind::Pie);
        assert_eq!(orgs.data[0], CategoryCount { category: Category::new("Military"), count: 2 });
        assert_eq!(
            orgs.shares[0],
            CategoryShare { category: Category::new("Military"), share: 0.5 }
        );
        assert_eq!(orgs.shares.len(), 3);

        let species = chart(&view, EntityKind::Individual).unwrap();
        assert!(species.shares.is_empty());
        assert_eq!(view.kpis(), vec![4, 9, 2]);
    }

    #[test]
    fn test_load_failure_yields_zero_kpis_and_error() {
        // franchise list is call 1; the entity batch fails on its second query
        let dash = dashboard(CountingSource::failing_on(
            3,
            SourceError::Connection("connection reset".to_string()),
        ));

        let view = dash.view();

        assert_eq!(view.kpis(), vec![0, 0, 0]);
        assert_eq!(view.errors.len(), 1);
        assert!(view.errors[0].starts_with("Error loading data for all franchises"));
        assert!(view
            .panels
            .iter()
            .all(|p| matches!(p.content, PanelContent::NoData { .. })));
    }

    #[test]
    fn test_empty_franchise_list_shows_notice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let loader = Loader::new(
            SqliteSource::from_connection(conn),
            Arc::new(QueryCache::default()),
        );

        let view = Dashboard::open(loader).view();

        assert_eq!(view.notice, Some(NO_FRANCHISES_NOTICE));
        assert_eq!(view.selector.options.len(), 1);
        assert!(view.loaded_at.is_none());
        assert!(view.errors.is_empty());
    }

    #[test]
    fn test_view_serializes_for_presentation() {
        let dash = dashboard(CountingSource::new());
        let json = serde_json::to_value(dash.view()).unwrap();

        assert_eq!(json["title"], "Overview: All franchises");
        assert_eq!(json["panels"][2]["content"]["type"], "chart");
        assert_eq!(json["filters"][1]["column"], "species");
        assert_eq!(json["selector"]["options"][1]["selection"]["id"], 1);
    }
}
