//! tsearch expand - Show how a keyword expands

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::{Result, SearchError};
use crate::search::types::MAX_KEYWORD_LEN;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Keyword to expand
    pub keyword: String,

    /// Maximum number of phrases (defaults to search.max_expansions)
    #[arg(long)]
    pub max: Option<usize>,
}

pub fn run(ctx: &AppContext, args: &ExpandArgs) -> Result<()> {
    let keyword = args.keyword.trim();
    if keyword.is_empty() || keyword.chars().count() > MAX_KEYWORD_LEN {
        return Err(SearchError::validation(
            "keyword",
            format!("must be 1-{MAX_KEYWORD_LEN} characters"),
        ));
    }
    let max = args
        .max
        .unwrap_or(ctx.orchestrator.options().max_expansions);
    if max == 0 {
        return Err(SearchError::validation("max", "must be at least 1"));
    }

    let expansion = ctx.orchestrator.expander().expand(keyword, max);

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&expansion));
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Expansion: {}", expansion.keyword))
        .kv("Normalized", &expansion.normalized_keyword)
        .kv("Domain", &expansion.domain)
        .kv("Confidence", &format!("{:.2}", expansion.confidence))
        .kv("Weight", &format!("{:.2}", expansion.weight))
        .kv(
            "Source",
            if expansion.is_curated() {
                "curated"
            } else {
                "no curated expansion"
            },
        )
        .blank()
        .section("Phrases");
    for phrase in &expansion.expanded_phrases {
        layout.bullet(phrase);
    }
    if !expansion.anti_patterns.is_empty() {
        layout.blank().section("Anti-patterns");
        for pattern in &expansion.anti_patterns {
            layout.bullet(pattern);
        }
    }
    emit_human(layout);
    Ok(())
}
