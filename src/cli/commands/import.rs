//! tsearch import - Load tender records into the local index

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::{Result, SearchError};
use crate::search::TenderRecord;

const BATCH_SIZE: usize = 500;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON-lines file, one tender record per line
    pub file: PathBuf,
}

#[derive(Serialize)]
struct ImportSummary {
    file: String,
    imported: usize,
    total_records: u64,
}

/// Parse a JSON-lines file of tender records. Blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<TenderRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TenderRecord = serde_json::from_str(&line).map_err(|err| {
            SearchError::Serialization(format!("{}:{}: {err}", path.display(), index + 1))
        })?;
        if record.tender_id.trim().is_empty() {
            return Err(SearchError::validation(
                "tender_id",
                format!("missing on line {}", index + 1),
            ));
        }
        records.push(record);
    }
    Ok(records)
}

pub fn run(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let records = read_records(&args.file)?;
    let sqlite = ctx.sqlite()?;

    let mut imported = 0;
    for batch in records.chunks(BATCH_SIZE) {
        imported += sqlite.index_records(batch)?;
    }
    let total_records = sqlite.record_count()?;
    info!(file = %args.file.display(), imported, total_records, "Import finished");

    let summary = ImportSummary {
        file: args.file.display().to_string(),
        imported,
        total_records,
    };
    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&summary));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Import complete")
        .kv("File", &summary.file)
        .kv("Imported", &summary.imported.to_string())
        .kv("Index total", &summary.total_records.to_string());
    emit_human(layout);
    Ok(())
}
