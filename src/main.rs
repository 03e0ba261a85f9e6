mod catalog;
mod compare;
mod extract;
mod fetch;
mod raw;
mod server;
mod snapshot;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::Value;

use fetch::CatalogClient;
use snapshot::{Snapshot, SnapshotCache};

#[derive(Parser)]
#[command(
    name = "program_compare",
    about = "Side-by-side comparison of degree programs from the RANEPA catalog feed"
)]
struct Cli {
    /// Directory holding the generated snapshot file
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Upstream catalog endpoint
    #[arg(long, default_value = fetch::DEFAULT_BASE_URL, global = true)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the full catalog and rebuild the snapshot file
    Refresh,
    /// List selectable programs
    Programs {
        /// Case-insensitive search over titles and codes
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Compare two programs by code
    Compare {
        left: String,
        right: String,
        /// Show only params whose values differ
        #[arg(long)]
        diff_only: bool,
    },
    /// Snapshot row counts
    Stats,
    /// Serve the snapshot + cache-warm endpoints over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let client = CatalogClient::new(&cli.base_url);

    match cli.command {
        Commands::Refresh => {
            let records = client.fetch_all().await?;
            println!("Fetched {} raw records", records.len());

            let snap = Snapshot::build(records);
            let path = snapshot::save(&cli.data_dir, &snap)?;
            println!(
                "Snapshot: {} programs, {} params, {} values -> {}",
                snap.programs.len(),
                snap.params.len(),
                snap.values.len(),
                path.display()
            );
        }
        Commands::Programs { query } => {
            let snap = snapshot::load(&cli.data_dir)?;
            let q = query.unwrap_or_default().trim().to_lowercase();

            let mut shown = 0usize;
            for p in &snap.programs {
                if !q.is_empty()
                    && !p.program_title.to_lowercase().contains(&q)
                    && !p.program_id.contains(&q)
                {
                    continue;
                }
                shown += 1;
                println!("{:>8}  {}", p.program_id, p.program_title);
            }
            if shown == 0 {
                println!("No programs matched.");
            } else {
                println!("\n{} of {} programs", shown, snap.programs.len());
            }
        }
        Commands::Compare { left, right, diff_only } => {
            let snap = snapshot::load(&cli.data_dir)?;
            match compare::compare(&snap, &left, &right, diff_only) {
                Some(cmp) => print_comparison(&cmp, diff_only),
                None => println!("No matching program for one of the codes. Run `programs` to list them."),
            }
        }
        Commands::Stats => {
            let snap = snapshot::load(&cli.data_dir)?;
            println!("Built:    {}", snap.built_at.to_rfc3339());
            println!("Programs: {}", snap.programs.len());
            println!("Params:   {}", snap.params.len());
            println!("Values:   {}", snap.values.len());
        }
        Commands::Serve { addr } => {
            let state = server::AppState {
                client: Arc::new(client),
                cache: Arc::new(SnapshotCache::default()),
            };
            server::serve(&addr, state).await?;
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    Ok(())
}

fn print_comparison(cmp: &compare::Comparison, diff_only: bool) {
    println!("Program 1: {}", cmp.left.program_title);
    println!("Program 2: {}", cmp.right.program_title);

    if cmp.groups.is_empty() {
        if diff_only {
            println!("\nNo differences.");
        }
        return;
    }

    for group in &cmp.groups {
        println!("\n── {} ──", group.subgroup);
        for row in &group.rows {
            let marker = if row.differs { "≠" } else { " " };
            println!(
                "{} {:<40} | {:<28} | {:<28}",
                marker,
                truncate(&row.param.param_title, 40),
                truncate(&display_value(row.left), 28),
                truncate(&display_value(row.right), 28),
            );
        }
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => extract::DASH.to_string(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ── End-to-end over captured feed pages ──

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use serde_json::json;

    fn page(fixture: &str) -> Value {
        let raw = std::fs::read_to_string(format!("tests/fixtures/{}.json", fixture)).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    /// Concatenate all fixture pages the way a full fetch cycle would:
    /// bachelor pages in page order, then the specialist page.
    fn full_feed() -> Vec<raw::RawRecord> {
        let mut records = fetch::page_records(&page("bakalavriat_page1"));
        records.extend(fetch::page_records(&page("bakalavriat_page2")));
        records.extend(fetch::page_records(&page("specialitet_page1")));
        records
    }

    #[test]
    fn first_page_announces_the_page_count() {
        assert_eq!(fetch::count_pages(&page("bakalavriat_page1")), 2);
        assert_eq!(fetch::count_pages(&page("bakalavriat_page2")), 2);
        assert_eq!(fetch::count_pages(&page("specialitet_page1")), 1);
    }

    #[test]
    fn snapshot_covers_the_deduplicated_catalog() {
        let snap = Snapshot::build(full_feed());

        // 7 raw records: one codeless, two cross-page/cross-level dupes.
        let ids: Vec<&str> = snap.programs.iter().map(|p| p.program_id.as_str()).collect();
        assert_eq!(ids, vec!["38.03.01-01", "38.03.04-02", "40.03.01-05", "38.05.01-01"]);
        assert_eq!(snap.values.len(), snap.programs.len() * snap.params.len());

        // First occurrence won: the page-2 duplicate's title lost.
        let first = &snap.programs[0];
        assert_eq!(first.program_title, "38.03.01-01 — Экономика и финансы");
        assert!(first.program_link.is_some());
    }

    #[test]
    fn extracted_values_read_like_the_feed() {
        let snap = Snapshot::build(full_feed());
        let value = |id: &str, key: &str| -> Value {
            snap.values
                .iter()
                .find(|v| v.program_id == id && v.param_key == key)
                .map(|v| v.value.clone())
                .unwrap()
        };

        assert_eq!(value("38.03.01-01", "army_deferral"), json!("есть"));
        assert_eq!(value("38.03.04-02", "army_deferral"), json!("нет"));
        assert_eq!(
            value("38.03.01-01", "subjects"),
            json!("Русский язык, Математика, Обществознание")
        );
        assert_eq!(
            value("38.03.04-02", "subjects"),
            json!("Русский язык, Математика (профильная)")
        );
        assert_eq!(
            value("38.03.04-02", "oprog"),
            json!("Программа готовит управленцев для органов государственной власти.")
        );
        // Missing aggregate fields dash out.
        assert_eq!(value("38.03.04-02", "score_prev_budget"), json!("—"));
    }

    #[test]
    fn comparison_sees_through_formatting_noise() {
        let snap = Snapshot::build(full_feed());

        // "349 000" vs "349000" is not a difference.
        let cmp = compare::compare(&snap, "38.03.01-01", "40.03.01-05", true).unwrap();
        let keys: Vec<&str> = cmp
            .groups
            .iter()
            .flat_map(|g| &g.rows)
            .map(|r| r.param.param_key.as_str())
            .collect();
        assert!(!keys.contains(&"price"));
        assert!(!keys.contains(&"year"));
        assert!(keys.contains(&"subjects"));

        // Same program against itself filters down to nothing.
        let cmp = compare::compare(&snap, "38.03.01-01", "38.03.01-01", true).unwrap();
        assert!(cmp.groups.is_empty());
    }
}
