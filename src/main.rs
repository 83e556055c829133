use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use franchise_dashboard::{
    import_dir, write_csv, Category, Dashboard, DashboardConfig, DashboardView, EntityKind,
    Loader, PanelContent, QueryCache, SqliteSource,
};

const USAGE: &str = "usage:
  franchise-dashboard import <csv-dir>
  franchise-dashboard franchises
  franchise-dashboard report [--franchise NAME] [--only COLUMN=V1,V2]... [--json]
  franchise-dashboard export <organizations|individuals|vehicles> <out.csv> [--franchise NAME] [--only COLUMN=V1,V2]...";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("franchise_dashboard=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = DashboardConfig::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("import") => {
            let dir = args.get(1).context("import needs a CSV directory")?;
            run_import(&config, Path::new(dir))
        }
        Some("franchises") => run_franchises(&config),
        Some("report") => run_report(&config, &ViewArgs::parse(&args[1..])?),
        Some("export") => {
            let entity = args.get(1).context("export needs an entity")?;
            let kind = EntityKind::parse(entity)
                .with_context(|| format!("unknown entity {:?}", entity))?;
            let out = args.get(2).context("export needs an output file")?;
            run_export(&config, kind, Path::new(out), &ViewArgs::parse(&args[3..])?)
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

/// Options shared by `report` and `export`
#[derive(Debug, Default)]
struct ViewArgs {
    franchise: Option<String>,
    only: Vec<(EntityKind, Vec<Category>)>,
    json: bool,
}

impl ViewArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = ViewArgs::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--franchise" => {
                    parsed.franchise = Some(iter.next().context("--franchise needs a name")?.clone());
                }
                "--only" => {
                    let spec = iter.next().context("--only needs COLUMN=V1,V2")?;
                    let (column, values) = spec
                        .split_once('=')
                        .with_context(|| format!("expected COLUMN=V1,V2, got {:?}", spec))?;
                    let kind = EntityKind::parse(column)
                        .with_context(|| format!("unknown filter column {:?}", column))?;
                    let categories = values
                        .split(',')
                        .filter(|v| !v.is_empty())
                        .map(Category::parse)
                        .collect();
                    parsed.only.push((kind, categories));
                }
                "--json" => parsed.json = true,
                other => bail!("unexpected argument {:?}\n{}", other, USAGE),
            }
        }

        Ok(parsed)
    }
}

fn open_dashboard(config: &DashboardConfig) -> Dashboard<SqliteSource> {
    let source = SqliteSource::open(&config.database_path, config.busy_timeout);
    let cache = Arc::new(QueryCache::new(config.cache_ttl));
    Dashboard::open(Loader::new(source, cache))
}

/// Open the dashboard and apply `--franchise` / `--only`
fn prepare(config: &DashboardConfig, args: &ViewArgs) -> Result<Dashboard<SqliteSource>> {
    let mut dashboard = open_dashboard(config);

    if let Some(name) = &args.franchise {
        if dashboard.select_label(name).is_none() {
            bail!("franchise {:?} not found", name);
        }
    }
    for (kind, categories) in &args.only {
        dashboard.set_filter(*kind, categories.iter().cloned());
    }

    Ok(dashboard)
}

fn run_import(config: &DashboardConfig, dir: &Path) -> Result<()> {
    println!("📂 Importing CSV files from {}", dir.display());

    let mut conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let summary = import_dir(&mut conn, dir)?;

    println!("✓ Franchises:    {}", summary.franchises);
    println!("✓ Organizations: {}", summary.organizations);
    println!("✓ Individuals:   {}", summary.individuals);
    println!("✓ Commanders:    {}", summary.commanders);
    println!("✓ Vehicles:      {}", summary.vehicles);
    println!("✅ Database ready at {}", config.database_path.display());

    Ok(())
}

fn run_franchises(config: &DashboardConfig) -> Result<()> {
    let view = open_dashboard(config).view();

    for (i, option) in view.selector.options.iter().enumerate() {
        let marker = if i == view.selector.selected { "*" } else { " " };
        println!("{} {}", marker, option.label);
    }
    print_messages(&view);

    Ok(())
}

fn run_report(config: &DashboardConfig, args: &ViewArgs) -> Result<()> {
    let view = prepare(config, args)?.view();

    if args.json {
        let stdout = io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &view)?;
        println!();
        return Ok(());
    }

    println!("🚀 {}", view.title);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_messages(&view);

    println!("\nFiltered results:");
    for panel in &view.panels {
        println!("  {:<22} {}", panel.kpi.label, panel.kpi.value);
    }

    for panel in &view.panels {
        println!("\n{}", panel.heading);
        match &panel.content {
            PanelContent::Chart(chart) => {
                println!("  {}", chart.title);
                let width = chart
                    .data
                    .iter()
                    .map(|c| c.category.to_string().chars().count())
                    .max()
                    .unwrap_or(0);
                for entry in &chart.data {
                    println!(
                        "  {:<width$}  {:>5}",
                        entry.category.to_string(),
                        entry.count,
                        width = width
                    );
                }
            }
            PanelContent::NoData { message } => println!("  ℹ️  {}", message),
        }
    }

    Ok(())
}

fn run_export(config: &DashboardConfig, kind: EntityKind, out: &Path, args: &ViewArgs) -> Result<()> {
    let dashboard = prepare(config, args)?;
    let view = dashboard.view();
    print_messages(&view);

    let filtered = dashboard.filtered_tables();
    let table = filtered.get(kind);
    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    write_csv(table, file)?;

    println!("✓ Wrote {} {} to {}", table.len(), kind, out.display());
    Ok(())
}

fn print_messages(view: &DashboardView) {
    let mut stderr = io::stderr();
    if let Some(notice) = view.notice {
        let _ = writeln!(stderr, "⚠️  {}", notice);
    }
    for error in &view.errors {
        let _ = writeln!(stderr, "❌ {}", error);
    }
}
