//! Background scheduler — four fixed jobs (hourly / every six hours /
//! daily at 02:00 UTC / weekly) that invoke the discovery pipeline on a
//! rotating seed topic. No two scheduled runs overlap; an overlap is
//! skipped with a warning rather than queued.
//!
//! Seed topics are the eight-item rotation from the original autonomous
//! engine's `TOPICS_QUEUE`, spanning physics through sociology — the
//! literature-search and numerical-pattern-scan jobs it also ran are not
//! reproduced here (they reach external paper indexes and a statistics
//! sub-library outside this system's scope).

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;
use crate::state::{DiscoveryState, Mode};

const TOPICS_QUEUE: &[(&str, &str)] = &[
    ("نسبية الزمن", "physics"),
    ("الأجنة في القرآن", "biology"),
    ("الذكر والصحة النفسية", "psychology"),
    ("العدل الاقتصادي", "economics"),
    ("الكونيات القرآنية", "astrophysics"),
    ("الطب الوقائي", "medicine"),
    ("القيادة والشورى", "management"),
    ("الأنظمة الاجتماعية", "sociology"),
];

struct Job {
    name: &'static str,
    cron_expr: &'static str,
}

const JOBS: &[Job] = &[
    Job { name: "hourly", cron_expr: "0 0 * * * *" },
    Job { name: "every_six_hours", cron_expr: "0 0 */6 * * *" },
    Job { name: "daily_02_utc", cron_expr: "0 0 2 * * *" },
    Job { name: "weekly_sunday_08_utc", cron_expr: "0 0 8 * * Sun" },
];

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    topic_idx: AtomicUsize,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            topic_idx: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Spawns one background task per job. Every task stops once
    /// `cancellation` fires (process shutdown).
    pub fn spawn(self: Arc<Self>, cancellation: CancellationToken) {
        for job in JOBS {
            let scheduler = self.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                scheduler.run_job_loop(job, cancellation).await;
            });
        }
    }

    async fn run_job_loop(&self, job: &Job, cancellation: CancellationToken) {
        let schedule = match Schedule::from_str(job.cron_expr) {
            Ok(schedule) => schedule,
            Err(err) => {
                tracing::error!(job = job.name, error = %err, "invalid cron expression, job disabled");
                return;
            }
        };

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::from_secs(1));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation.cancelled() => return,
            }

            self.run_once(job.name).await;
        }
    }

    /// Runs one scheduled discovery against the next seeded topic. Skips
    /// (with a warning) if a previous scheduled run is still in flight.
    async fn run_once(&self, job_name: &str) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(job = job_name, "skipping scheduled run: a prior run is still in flight");
            return;
        }

        let idx = self.topic_idx.fetch_add(1, Ordering::SeqCst) % TOPICS_QUEUE.len();
        let (topic, discipline) = TOPICS_QUEUE[idx];
        let session_id = format!("scheduled-{job_name}-{idx}");
        let initial = DiscoveryState::new(topic, vec![discipline.to_string()], Some(Mode::Autonomous));

        match self.orchestrator.invoke(initial, &session_id).await {
            Ok(state) => tracing::info!(
                job = job_name,
                topic,
                discovery_id = ?state.discovery_id,
                "scheduled discovery finished"
            ),
            Err(err) => tracing::error!(job = job_name, error = %err, "scheduled discovery failed"),
        }

        self.running.store(false, Ordering::SeqCst);
    }
}
