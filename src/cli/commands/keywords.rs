//! tsearch keywords - Browse dictionary keywords

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::expansion::ExpansionEntry;

#[derive(Args, Debug)]
pub struct KeywordsArgs {
    /// Only keywords of this domain
    #[arg(long)]
    pub domain: Option<String>,

    /// Keywords whose key or expansions contain this text
    #[arg(long, short)]
    pub query: Option<String>,

    /// Maximum matches for --query
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

#[derive(Serialize)]
struct KeywordListing {
    domain: Option<String>,
    count: usize,
    keywords: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &KeywordsArgs) -> Result<()> {
    let dictionary = ctx.orchestrator.expander().snapshot();

    if let Some(query) = &args.query {
        let mut matches: Vec<ExpansionEntry> = dictionary
            .search_keywords(query, args.limit)
            .into_iter()
            .cloned()
            .collect();
        if let Some(domain) = &args.domain {
            matches.retain(|entry| &entry.domain == domain);
        }
        if ctx.robot_mode() {
            return emit_robot(&robot_ok(&matches));
        }

        let mut layout = HumanLayout::new();
        layout.title(&format!("Keywords matching '{query}' ({})", matches.len()));
        for entry in &matches {
            layout.bullet(&format!(
                "{} [{}]: {}",
                entry.keyword,
                entry.domain,
                entry.expansions.join(", ")
            ));
        }
        emit_human(layout);
        return Ok(());
    }

    let keywords = match &args.domain {
        Some(domain) => dictionary.domain_keywords(domain),
        None => dictionary.keywords(),
    };
    let listing = KeywordListing {
        domain: args.domain.clone(),
        count: keywords.len(),
        keywords,
    };
    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&listing));
    }

    let mut layout = HumanLayout::new();
    match &listing.domain {
        Some(domain) => layout.title(&format!("Keywords in {domain} ({})", listing.count)),
        None => layout.title(&format!("Keywords ({})", listing.count)),
    };
    for keyword in &listing.keywords {
        layout.bullet(keyword);
    }
    emit_human(layout);
    Ok(())
}
