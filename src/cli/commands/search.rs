//! tsearch search - Expanded, ranked search

use chrono::NaiveDate;
use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::search::{FilterField, SearchFilters, SearchRequest, SearchResult};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Keyword to expand and search for
    pub keyword: String,

    /// Service category (repeatable)
    #[arg(long)]
    pub category: Vec<String>,

    /// Issuing organization (repeatable)
    #[arg(long)]
    pub organization: Vec<String>,

    /// Value range bucket (repeatable)
    #[arg(long)]
    pub value_range: Vec<String>,

    /// Region (repeatable)
    #[arg(long)]
    pub region: Vec<String>,

    /// Tender status (repeatable)
    #[arg(long)]
    pub status: Vec<String>,

    /// Department type (repeatable)
    #[arg(long)]
    pub department_type: Vec<String>,

    /// Complexity level (repeatable)
    #[arg(long)]
    pub complexity: Vec<String>,

    /// Earliest tender date, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Latest tender date, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Drop results below this similarity (0-100)
    #[arg(long, default_value = "0")]
    pub min_similarity: f64,

    /// Page size (defaults to the configured limit)
    #[arg(long, short)]
    pub limit: Option<usize>,

    /// Results to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

impl SearchArgs {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters::default()
            .with(FilterField::ServiceCategory, self.category.iter().cloned())
            .with(FilterField::Organization, self.organization.iter().cloned())
            .with(FilterField::ValueRange, self.value_range.iter().cloned())
            .with(FilterField::Region, self.region.iter().cloned())
            .with(FilterField::Status, self.status.iter().cloned())
            .with(FilterField::DepartmentType, self.department_type.iter().cloned())
            .with(FilterField::Complexity, self.complexity.iter().cloned())
            .with_dates(self.from, self.to)
            .with_min_similarity(self.min_similarity)
    }

    pub fn request(&self) -> Result<SearchRequest> {
        let mut request = SearchRequest::new(&self.keyword)?
            .with_filters(self.filters())
            .with_offset(self.offset);
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        Ok(request)
    }
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let request = args.request()?;
    let result = ctx.block_on(ctx.orchestrator.search(&request))?;

    if ctx.robot_mode() {
        let configured = ctx.config.search.engine.to_string();
        let mut response = robot_ok(&result);
        if result.engine_used != configured {
            response = response.with_warning(format!(
                "{configured} unavailable, results served by {}",
                result.engine_used
            ));
        }
        return emit_robot(&response);
    }

    emit_human(render(&result));
    Ok(())
}

fn render(result: &SearchResult) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Search: {}", result.query))
        .kv("Domain", &result.domain)
        .kv("Confidence", &format!("{:.2}", result.confidence))
        .kv("Expanded", &result.expanded_phrases.join(", "))
        .kv("Engine", &result.engine_used)
        .kv(
            "Matches",
            &format!(
                "{} (showing {} from offset {})",
                result.total_matches,
                result.hits.len(),
                result.offset
            ),
        )
        .kv("Time", &format!("{} ms", result.execution_time_ms));
    if !result.filters_applied.is_empty() {
        layout.kv("Filters", &result.filters_applied.join(", "));
    }
    layout.blank();

    if result.hits.is_empty() {
        layout.push_line("No matching tenders.");
        return layout;
    }

    layout.section("Results");
    for hit in &result.hits {
        let marker = if hit.exact_match { "*" } else { " " };
        layout.push_line(format!(
            "{marker} {:>6.2}%  {}  {}",
            hit.similarity_percent, hit.record.tender_id, hit.record.title
        ));
        let date = hit.record.date.map(|date| date.to_string()).unwrap_or_default();
        let details: Vec<&str> = [
            hit.record.organization.as_str(),
            hit.record.status.as_str(),
            date.as_str(),
        ]
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect();
        if !details.is_empty() {
            layout.push_line(format!("           {}", details.join(" | ")));
        }
        layout.push_line(format!(
            "           matched: {}",
            hit.matched_phrases.join(", ")
        ));
    }
    layout
}
