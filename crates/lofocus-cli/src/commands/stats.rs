use clap::Subcommand;

use lofocus_core::{DayKey, StatisticsReader, StatsScope};

use super::AppContext;

#[derive(Subcommand)]
pub enum StatsAction {
    /// All-time stats
    Total,
    /// Today's stats
    Today,
    /// Stats of one day
    Day {
        /// Date as YYYY-MM-DD
        date: DayKey,
    },
}

pub async fn run(action: StatsAction, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let scope = match action {
        StatsAction::Total => StatsScope::AllTime,
        StatsAction::Today => StatsScope::today(),
        StatsAction::Day { date } => StatsScope::Day(date),
    };

    let reader = StatisticsReader::new(ctx.db.clone(), ctx.remote.clone());
    // a one-shot process has no fresh totals of its own
    let stats = reader.read(&scope, ctx.identity.as_ref(), None).await;

    let output = serde_json::json!({
        "scope": scope.to_string(),
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
