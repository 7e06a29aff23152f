//! tsearch health - Probe the active search engine

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::{Result, SearchError};

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Exit non-zero when the engine is unhealthy
    #[arg(long)]
    pub strict: bool,
}

pub fn run(ctx: &AppContext, args: &HealthArgs) -> Result<()> {
    let status = ctx.block_on(ctx.orchestrator.health());

    if ctx.robot_mode() {
        emit_robot(&robot_ok(&status))?;
    } else {
        let mut layout = HumanLayout::new();
        layout
            .title("Search engine health")
            .kv("Engine", &status.engine)
            .kv("Status", if status.ok { "ok" } else { "unhealthy" })
            .kv("Latency", &format!("{} ms", status.latency_ms));
        if let Some(message) = &status.message {
            layout.kv("Message", message);
        }
        emit_human(layout);
    }

    if args.strict && !status.ok {
        return Err(SearchError::backend(
            status.engine.clone(),
            status.message.as_deref().unwrap_or("health check failed"),
        ));
    }
    Ok(())
}
