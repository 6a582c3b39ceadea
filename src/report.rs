//! Sweep results.
//!
//! Raw per-iteration timings only. The JSON output is a plain dump of the
//! samples for external analysis.

use crate::error::BenchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Which benchmark produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    MsgRtt { size: usize },
    ConRtt,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::MsgRtt { size } => write!(f, "msg-rtt/{size}"),
            RunKind::ConRtt => f.write_str("con-rtt"),
        }
    }
}

/// A run that completed every iteration.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub kind: RunKind,
    pub samples: Vec<Duration>,
}

/// The run that stopped the sweep. It carries no samples.
#[derive(Debug)]
pub struct AbortedRun {
    pub kind: RunKind,
    pub error: BenchError,
}

/// All runs of one client invocation, in execution order.
#[derive(Debug)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub completed: Vec<RunResult>,
    pub aborted: Option<AbortedRun>,
}

impl SweepReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            completed: Vec::new(),
            aborted: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    started_at: String,
    transport: &'a str,
    runs: Vec<JsonRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<JsonAborted>,
}

#[derive(Serialize)]
struct JsonRun {
    benchmark: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_size: Option<usize>,
    iterations: usize,
    samples_ns: Vec<u64>,
}

#[derive(Serialize)]
struct JsonAborted {
    run: String,
    error: String,
}

fn benchmark_name(kind: RunKind) -> (&'static str, Option<usize>) {
    match kind {
        RunKind::MsgRtt { size } => ("msg_rtt", Some(size)),
        RunKind::ConRtt => ("con_rtt", None),
    }
}

/// Serialize `report` as JSON to `out`.
pub fn to_json<W: Write>(report: &SweepReport, transport: &str, out: W) -> io::Result<()> {
    let runs = report
        .completed
        .iter()
        .map(|run| {
            let (benchmark, message_size) = benchmark_name(run.kind);
            JsonRun {
                benchmark,
                message_size,
                iterations: run.samples.len(),
                samples_ns: run
                    .samples
                    .iter()
                    .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
                    .collect(),
            }
        })
        .collect();

    let json = JsonReport {
        started_at: report.started_at.to_rfc3339(),
        transport,
        runs,
        aborted: report.aborted.as_ref().map(|a| JsonAborted {
            run: a.kind.to_string(),
            error: a.error.to_string(),
        }),
    };

    serde_json::to_writer_pretty(out, &json)?;
    Ok(())
}

/// Write `report` as JSON to the file at `path`.
pub fn write_json(report: &SweepReport, transport: &str, path: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    to_json(report, transport, &mut out)?;
    out.flush()
}
