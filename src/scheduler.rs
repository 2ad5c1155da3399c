//! Polling loop driving reply cycles at jittered intervals

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::client::MailClient;
use crate::compose::MessageComposer;
use crate::config::{Config, ScheduleConfig};
use crate::error::{ResponderError, Result};
use crate::filter::QualificationFilter;
use crate::label_manager::LabelManager;
use crate::worker::{ReplyOutcome, ReplyWorker};

/// Supplies the pause before each cycle
pub trait IntervalSource: Send + Sync {
    fn next_interval(&mut self) -> Duration;
}

/// Whole seconds drawn uniformly from an inclusive range
pub struct JitteredInterval {
    min_secs: u64,
    max_secs: u64,
    rng: StdRng,
}

impl JitteredInterval {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self::with_rng(min_secs, max_secs, StdRng::from_entropy())
    }

    /// Deterministic sequence for a given seed
    pub fn seeded(min_secs: u64, max_secs: u64, seed: u64) -> Self {
        Self::with_rng(min_secs, max_secs, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(schedule: &ScheduleConfig) -> Self {
        Self::new(schedule.min_interval_secs, schedule.max_interval_secs)
    }

    fn with_rng(min_secs: u64, max_secs: u64, rng: StdRng) -> Self {
        // Guard against a reversed window rather than panicking in gen_range
        let (min_secs, max_secs) = if min_secs <= max_secs {
            (min_secs, max_secs)
        } else {
            (max_secs, min_secs)
        };
        Self {
            min_secs,
            max_secs,
            rng,
        }
    }
}

impl IntervalSource for JitteredInterval {
    fn next_interval(&mut self) -> Duration {
        Duration::from_secs(self.rng.gen_range(self.min_secs..=self.max_secs))
    }
}

/// Fixed intervals replayed in order, the last one repeating
pub struct FixedIntervals {
    intervals: Vec<Duration>,
    position: usize,
}

impl FixedIntervals {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self {
            intervals,
            position: 0,
        }
    }
}

impl IntervalSource for FixedIntervals {
    fn next_interval(&mut self) -> Duration {
        let interval = self
            .intervals
            .get(self.position)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or_default();
        self.position += 1;
        interval
    }
}

/// Process-wide state, fixed once startup completes
pub struct ResponderContext {
    pub client: Arc<dyn MailClient>,
    pub label_id: String,
    pub composer: MessageComposer,
    pub dry_run: bool,
}

impl ResponderContext {
    /// Resolve the label and the account address
    ///
    /// Any failure here is fatal for the process.
    pub async fn initialize(client: Arc<dyn MailClient>, config: &Config) -> Result<Self> {
        let label_id = LabelManager::new(Arc::clone(&client))
            .ensure_label(&config.responder.label_name)
            .await?;

        let address = client.account_address().await?;
        info!("Replying as {}", address);

        Ok(Self {
            client,
            label_id,
            composer: MessageComposer::new(address),
            dry_run: config.execution.dry_run,
        })
    }
}

/// Tally of one polling cycle
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub found: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub reconciliation_gaps: usize,
    pub previewed: usize,
}

impl CycleSummary {
    fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            found: 0,
            succeeded: 0,
            skipped: 0,
            reconciliation_gaps: 0,
            previewed: 0,
        }
    }

    fn record(&mut self, outcome: &ReplyOutcome) {
        match outcome {
            ReplyOutcome::Done => self.succeeded += 1,
            ReplyOutcome::Skipped(_) => self.skipped += 1,
            ReplyOutcome::ReconciliationGap(_) => self.reconciliation_gaps += 1,
            ReplyOutcome::Previewed => self.previewed += 1,
        }
    }
}

/// Single logical worker running cycles back to back
pub struct Scheduler {
    ctx: Arc<ResponderContext>,
    filter: QualificationFilter,
    worker: ReplyWorker,
    intervals: Box<dyn IntervalSource>,
}

impl Scheduler {
    pub fn new(ctx: Arc<ResponderContext>, intervals: Box<dyn IntervalSource>) -> Self {
        Self {
            worker: ReplyWorker::new(Arc::clone(&ctx)),
            ctx,
            filter: QualificationFilter::default(),
            intervals,
        }
    }

    /// Scheduler for a single immediate cycle, with no interval source
    pub fn single_shot(ctx: Arc<ResponderContext>) -> Self {
        Self::new(ctx, Box::new(FixedIntervals::new(Vec::new())))
    }

    /// List candidates and process each in listing order
    ///
    /// The first error that is not message-scoped ends the cycle early. The
    /// remaining candidates are left for the next cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let mut summary = CycleSummary::new();
        let span = tracing::info_span!("cycle", cycle_id = %summary.cycle_id);

        let result = async {
            let candidates = self.filter.candidates(self.ctx.client.as_ref()).await?;
            summary.found = candidates.len();
            info!("Found {} candidate messages", summary.found);

            for message in &candidates {
                let outcome = self.worker.process(message).await?;
                summary.record(&outcome);
            }

            info!(
                found = summary.found,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                reconciliation_gaps = summary.reconciliation_gaps,
                previewed = summary.previewed,
                "Cycle complete"
            );
            Ok::<_, ResponderError>(())
        }
        .instrument(span)
        .await;

        if let Err(e) = result {
            warn!(
                cycle_id = %summary.cycle_id,
                found = summary.found,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                reconciliation_gaps = summary.reconciliation_gaps,
                previewed = summary.previewed,
                "Cycle ended early: {}",
                e
            );
            return Err(e);
        }
        Ok(summary)
    }

    /// Run a single cycle immediately
    pub async fn run_once(&self) -> Result<CycleSummary> {
        self.run_cycle().await
    }

    /// Sleep, run a cycle, repeat until cancelled
    ///
    /// Cycle errors are logged and never end the loop. Cancellation is
    /// observed while sleeping; an in-flight cycle runs to completion.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Responder started (dry_run: {})", self.ctx.dry_run);

        loop {
            let interval = self.intervals.next_interval();
            info!("Next cycle in {}s", interval.as_secs());

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match self.run_cycle().await {
                Ok(_) => {}
                Err(e) if e.is_permanent() => {
                    error!("Cycle aborted: {}", e);
                }
                Err(e) => {
                    warn!("Cycle aborted, will retry next cycle: {}", e);
                }
            }
        }

        info!("Responder stopped");
    }
}

/// Resolve startup state and run the loop until `shutdown` fires
pub async fn start(
    client: Arc<dyn MailClient>,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<()> {
    let ctx = Arc::new(ResponderContext::initialize(client, config).await?);
    let intervals = Box::new(JitteredInterval::from_config(&config.schedule));
    Scheduler::new(ctx, intervals).run(shutdown).await;
    Ok(())
}
