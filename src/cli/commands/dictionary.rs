//! tsearch dictionary - Statistics and quality of the expansion dictionary

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::expansion::{DictionaryStats, QualityReport, ReloadReport};

#[derive(Args, Debug)]
pub struct DictionaryArgs {
    /// Re-read the dictionary file strictly (no built-in fallback)
    #[arg(long)]
    pub reload: bool,
}

#[derive(Serialize)]
struct DictionaryReport {
    statistics: DictionaryStats,
    quality: QualityReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    reload: Option<ReloadReport>,
}

pub fn run(ctx: &AppContext, args: &DictionaryArgs) -> Result<()> {
    let expander = ctx.orchestrator.expander();
    let reload = if args.reload {
        Some(expander.reload()?)
    } else {
        None
    };

    let dictionary = expander.snapshot();
    let report = DictionaryReport {
        statistics: dictionary.statistics(),
        quality: dictionary.validate_quality(),
        reload,
    };

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&report));
    }

    let stats = &report.statistics;
    let quality = &report.quality;
    let mut layout = HumanLayout::new();
    layout
        .title("Expansion dictionary")
        .kv("Source", &stats.source)
        .kv("Version", &stats.version)
        .kv("Loaded", &stats.loaded_at.to_rfc3339())
        .kv("Keywords", &stats.total_keywords.to_string())
        .kv("Expansions", &stats.total_expansions.to_string())
        .kv(
            "Avg expansions",
            &format!("{:.2}", stats.average_expansions_per_keyword),
        )
        .kv("Avg weight", &format!("{:.2}", stats.average_weight))
        .kv("Anti-patterns", &stats.anti_patterns_configured.to_string())
        .blank()
        .section("Domains");
    for (domain, count) in &stats.domain_distribution {
        layout.kv(domain, &count.to_string());
    }

    layout
        .blank()
        .section("Quality")
        .kv(
            "Score",
            &format!("{} ({})", quality.quality_score, quality.quality_rating),
        )
        .kv(
            "Well defined",
            &format!("{}/{}", quality.well_defined_keywords, quality.total_keywords),
        );
    for issue in &quality.issues {
        layout.bullet(&format!("issue: {issue}"));
    }
    for warning in &quality.warnings {
        layout.bullet(&format!("warning: {warning}"));
    }

    if let Some(reload) = &report.reload {
        layout.blank().section("Reload").kv(
            "Keywords",
            &format!("{} -> {}", reload.previous_keywords, reload.current_keywords),
        );
    }
    emit_human(layout);
    Ok(())
}
