//! Progress command - report reading progress for a chapter.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use fable_client::{ProgressReporter, ReportOutcome, SharedProgressSink};

use super::Context;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Chapter identifier
    pub chapter_id: String,

    /// Raw percentages, reported in order
    #[arg(required = true, num_args = 1..)]
    pub values: Vec<f64>,

    /// Initial retry backoff in milliseconds
    #[arg(long, default_value_t = 500)]
    pub backoff_ms: u64,
}

pub async fn run(args: ProgressArgs, ctx: &Context) -> Result<()> {
    let broker = ctx.signed_in_broker().await?;
    let sink: SharedProgressSink = broker;
    let reporter = ProgressReporter::new(sink, ctx.notifier())
        .with_initial_backoff(Duration::from_millis(args.backoff_ms));

    for raw in args.values {
        let outcome = reporter.report(&args.chapter_id, raw).await;
        if ctx.verbose || ctx.json_output {
            println!("{:>6.1} -> {}", raw, describe(&outcome));
        }
    }
    Ok(())
}

fn describe(outcome: &ReportOutcome) -> String {
    match outcome {
        ReportOutcome::Sent {
            progress,
            completed: true,
        } => format!("sent {}% (completed)", progress),
        ReportOutcome::Sent { progress, .. } => format!("sent {}%", progress),
        ReportOutcome::Skipped { progress } => format!("skipped ({}%)", progress),
        ReportOutcome::Rejected(reason) => format!("rejected ({:?})", reason),
        ReportOutcome::Failed { progress, kind } => format!("failed {}% ({:?})", progress, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fable_client::{FailureKind, ProgressRejection};

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&ReportOutcome::Sent {
                progress: 100,
                completed: true
            }),
            "sent 100% (completed)"
        );
        assert_eq!(describe(&ReportOutcome::Skipped { progress: 0 }), "skipped (0%)");
        assert_eq!(
            describe(&ReportOutcome::Rejected(ProgressRejection::EmptyChapterId)),
            "rejected (EmptyChapterId)"
        );
        assert_eq!(
            describe(&ReportOutcome::Failed {
                progress: 40,
                kind: FailureKind::BackendUnavailable
            }),
            "failed 40% (BackendUnavailable)"
        );
    }
}
