//! tsearch facets - Filter values available in the local index

use std::collections::BTreeMap;

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::search::backend::sqlite::FacetValue;

#[derive(Args, Debug)]
pub struct FacetsArgs {
    /// Values shown per category in human output
    #[arg(long, default_value = "10")]
    pub top: usize,
}

pub fn run(ctx: &AppContext, args: &FacetsArgs) -> Result<()> {
    let sqlite = ctx.sqlite()?;
    let options: BTreeMap<&'static str, Vec<FacetValue>> = sqlite
        .filter_options()?
        .into_iter()
        .map(|(field, values)| (field.label(), values))
        .collect();

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&options));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Filter options")
        .kv("Index", &sqlite.path().display().to_string())
        .kv("Records", &sqlite.record_count()?.to_string())
        .blank();
    for (label, values) in &options {
        layout.section(label);
        if values.is_empty() {
            layout.push_line("(none)");
        }
        for value in values.iter().take(args.top) {
            layout.kv(&value.value, &value.count.to_string());
        }
        layout.blank();
    }
    emit_human(layout);
    Ok(())
}
