//! Human and JSON rendering of driver counters.

use anyhow::Result;
use omni_blk::StatsSnapshot;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub reads: u64,
    pub writes: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub irqs: u64,
}

impl From<StatsSnapshot> for StatsReport {
    fn from(s: StatsSnapshot) -> Self {
        Self {
            reads: s.reads,
            writes: s.writes,
            errors: s.errors,
            timeouts: s.timeouts,
            irqs: s.irqs,
        }
    }
}

pub fn print_stats(stats: StatsSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&StatsReport::from(stats))?);
    } else {
        println!("Stats - {stats}");
    }
    Ok(())
}
