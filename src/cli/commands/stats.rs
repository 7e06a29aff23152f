//! tsearch stats - Active engine and local index statistics

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::search::backend::HealthStatus;
use crate::search::backend::sqlite::{IndexStatistics, Share};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Values shown per distribution in human output
    #[arg(long, default_value = "5")]
    pub top: usize,
}

#[derive(Serialize)]
struct EngineInfo {
    active_engine: String,
    health: HealthStatus,
    index: IndexStatistics,
}

pub fn run(ctx: &AppContext, args: &StatsArgs) -> Result<()> {
    let health = ctx.block_on(ctx.orchestrator.health());
    let index = ctx.sqlite()?.statistics()?;
    let info = EngineInfo {
        active_engine: ctx.config.search.engine.as_str().to_string(),
        health,
        index,
    };

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&info));
    }

    let index = &info.index;
    let mut layout = HumanLayout::new();
    layout
        .title("Search engine")
        .kv("Active", &info.active_engine)
        .kv("Status", if info.health.ok { "ok" } else { "unhealthy" })
        .blank()
        .section("Local index")
        .kv("Records", &index.total_records.to_string())
        .kv("Size", &format_size(index.database_size_bytes))
        .kv("Titles", &format!(
            "avg {:.1} chars (min {}, max {})",
            index.titles.average, index.titles.min, index.titles.max
        ));
    match (index.dates.earliest, index.dates.latest) {
        (Some(from), Some(to)) => {
            layout.kv(
                "Dates",
                &format!("{from} to {to} ({} days)", index.dates.span_days),
            );
        }
        _ => {
            layout.kv("Dates", "(none)");
        }
    }
    layout.blank();

    for (label, shares) in [
        ("Service categories", &index.service_categories),
        ("Regions", &index.regions),
        ("Value ranges", &index.value_ranges),
    ] {
        push_shares(&mut layout, label, shares, args.top);
    }
    layout.section("Top organizations");
    for org in index.top_organizations.iter().take(args.top) {
        layout.kv(&org.value, &org.count.to_string());
    }
    emit_human(layout);
    Ok(())
}

fn push_shares(layout: &mut HumanLayout, label: &str, shares: &[Share], top: usize) {
    layout.section(label);
    if shares.is_empty() {
        layout.push_line("(none)");
    }
    for share in shares.iter().take(top) {
        layout.kv(&share.value, &format!("{} ({:.1}%)", share.count, share.percentage));
    }
    layout.blank();
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes < 1024 * 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MiB", bytes as f64 / MIB)
    }
}
