use std::{sync::Arc, time::Duration, time::Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use hrm_core::allocation::{plan_da_increment, AllocationPlan};
use hrm_storage::{Database, EmployeeError};

/// What started an allocation run; used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

impl RunTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Ranks every employee and persists the top decile's DA increments.
#[derive(Clone)]
pub struct DaIncrementRunner {
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl DaIncrementRunner {
    pub fn new(database: Database, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        Self { database, clock }
    }

    /// Executes one allocation run. Awards are written in a single transaction.
    pub async fn run(&self, trigger: RunTrigger) -> Result<AllocationPlan, AllocationError> {
        let start = Instant::now();
        let result = self.allocate().await;
        histogram!("da_increment_run_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(plan) => {
                counter!("da_increment_runs_total", "trigger" => trigger.as_str(), "result" => "ok")
                    .increment(1);
                gauge!("da_increment_recipients").set(plan.awards.len() as f64);
                info!(
                    stage = "allocation",
                    trigger = trigger.as_str(),
                    evaluated = plan.evaluated,
                    recipients = plan.awards.len(),
                    "DA increment run completed"
                );
            }
            Err(err) => {
                counter!("da_increment_runs_total", "trigger" => trigger.as_str(), "result" => "error")
                    .increment(1);
                error!(
                    stage = "allocation",
                    trigger = trigger.as_str(),
                    error = %err,
                    "DA increment run failed"
                );
            }
        }

        result
    }

    async fn allocate(&self) -> Result<AllocationPlan, AllocationError> {
        let repo = self.database.employees();
        let employees = repo.list_all().await.map_err(AllocationError::Load)?;
        let plan = plan_da_increment(&employees);
        repo.apply_da_increments(&plan.awards, (self.clock)())
            .await
            .map_err(AllocationError::Persist)?;
        Ok(plan)
    }
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("failed to load employees")]
    Load(#[source] EmployeeError),
    #[error("failed to persist increments")]
    Persist(#[source] EmployeeError),
}

/// Background worker that repeats the allocation on a fixed cadence.
#[derive(Clone)]
pub struct IncrementWorker {
    runner: DaIncrementRunner,
    interval: Duration,
}

impl IncrementWorker {
    pub fn new(runner: DaIncrementRunner, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Runs the worker loop in the background. The first run happens immediately.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }

    async fn run_loop(self) {
        info!(
            stage = "allocation",
            interval_secs = self.interval.as_secs(),
            "scheduled DA increment worker started"
        );
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Failures are already logged and counted by the runner.
            let _ = self.runner.run(RunTrigger::Scheduled).await;
        }
    }
}
