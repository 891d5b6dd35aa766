pub mod config;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod pose;
pub mod profile;
pub mod segmentation;
pub mod session;
mod utils;

use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::{AggregationMode, EngineConfig};
pub use error::EngineError;
pub use evaluation::FormEvaluator;
pub use models::{
    FrameLandmarks, Landmark, LandmarkName, RepOutcome, RepScore, SessionSummary, Violation,
};
pub use session::{
    analyze, analyze_channel, analyze_until, AnalysisSession, FrameReport, FrameSource,
    MalformedPolicy,
};

/// Path of an optional JSON engine config.
pub const CONFIG_ENV: &str = "SQUATFORM_CONFIG";

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Read landmark frames as JSON lines on stdin, print the session summary as
/// JSON on stdout. Ctrl-C ends the session early with a partial summary.
pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("squatform starting up...");

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => EngineConfig::load(Path::new(&path))?,
        None => EngineConfig::default(),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let summary = runtime.block_on(analyze_stdin(config))?;

    let output = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    println!("{output}");
    Ok(())
}

async fn analyze_stdin(config: EngineConfig) -> anyhow::Result<SessionSummary> {
    let session = AnalysisSession::new(config)?;
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let cancel_token = CancellationToken::new();

    let reader = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let stdin = std::io::stdin();
        for (line_no, line) in stdin.lock().lines().enumerate() {
            let line = line.context("Failed to read stdin")?;
            let Some(frame) = parse_frame_line(&line)
                .with_context(|| format!("Line {} is not a landmark frame", line_no + 1))?
            else {
                continue;
            };
            if tx.blocking_send(frame).is_err() {
                break;
            }
        }
        Ok(())
    });

    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, summarizing frames seen so far");
            ctrl_c_token.cancel();
        }
    });

    let summary = analyze_channel(session, rx, MalformedPolicy::Skip, cancel_token).await?;

    // After a cancel the reader may still be blocked on stdin.
    if summary.completed {
        reader.await.context("Stdin reader panicked")??;
    }
    Ok(summary)
}

/// Blank lines are skipped.
fn parse_frame_line(line: &str) -> anyhow::Result<Option<FrameLandmarks>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_frame_per_line() {
        let line = r#"{"index": 4, "landmarks": {"left_knee": {"x": 0.5, "y": 0.6, "confidence": 0.9}}}"#;
        let frame = parse_frame_line(line).unwrap().unwrap();
        assert_eq!(frame.index, 4);
        assert_eq!(frame.get(LandmarkName::LeftKnee), Some(&Landmark::new(0.5, 0.6, 0.9)));
    }

    #[test]
    fn blank_lines_are_skipped_and_garbage_is_an_error() {
        assert!(parse_frame_line("   ").unwrap().is_none());
        assert!(parse_frame_line("{\"index\": \"x\"}").is_err());
    }
}
