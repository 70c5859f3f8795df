//! Daily trigger for the newsletter run.
//!
//! The scheduler ticks once per second and starts the job when today's slot
//! has passed and the last run started before that slot. At most one run is
//! in flight: a slot that comes due while the previous run is still going is
//! picked up once that run finishes.
//!
//! The start time of every finished run is written to a small JSON state
//! file. After a crash or restart the stored time decides whether today's
//! slot still has to be run; without a state file only future slots count.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;

/// A fixed local wall-clock time, once per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Today's slot relative to `now`.
    pub fn slot_for(&self, now: NaiveDateTime) -> NaiveDateTime {
        now.date().and_time(self.at)
    }

    /// The first slot strictly after `now`.
    pub fn next_slot(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = self.slot_for(now);
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }

    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<NaiveDateTime>) -> bool {
        let slot = self.slot_for(now);
        now >= slot && last_run.is_none_or(|last| last < slot)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LastRunRecord {
    last_run: DateTime<Utc>,
}

/// JSON file holding the start time of the last finished run.
#[derive(Debug, Clone)]
pub struct LastRunStore {
    path: PathBuf,
}

impl LastRunStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `None` when nothing was recorded yet. An unreadable record is
    /// reported and treated the same way.
    pub async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<LastRunRecord>(&content) {
            Ok(record) => Ok(Some(record.last_run)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt last-run record");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, last_run: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(&LastRunRecord { last_run })?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), %last_run, "Recorded last run");
        Ok(())
    }
}

pub struct Scheduler<J> {
    schedule: DailySchedule,
    store: LastRunStore,
    job: Arc<J>,
    last_started: Option<NaiveDateTime>,
    in_flight: Option<JoinHandle<()>>,
    overrun_reported: bool,
}

impl<J, F> Scheduler<J>
where
    J: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(schedule: DailySchedule, store: LastRunStore, job: J) -> Self {
        Self {
            schedule,
            store,
            job: Arc::new(job),
            last_started: None,
            in_flight: None,
            overrun_reported: false,
        }
    }

    /// Pick up the last recorded run. Without one, slots already past today
    /// are skipped.
    pub async fn restore(&mut self, now: DateTime<Local>) -> Result<()> {
        self.last_started = match self.store.load().await? {
            Some(last) => {
                let last = last.with_timezone(&Local).naive_local();
                info!(%last, "Restored last run");
                Some(last)
            }
            None => {
                info!("No previous run recorded; waiting for the next slot");
                Some(now.naive_local())
            }
        };
        Ok(())
    }

    /// Tick once per second until Ctrl-C.
    #[instrument(level = "info", skip(self))]
    pub async fn run(mut self) -> Result<()> {
        self.restore(Local::now()).await?;
        info!(next = %self.schedule.next_slot(Local::now().naive_local()), "Scheduler started");

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(Local::now());
                }
            }
        }

        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                warn!("Abandoning the run in flight");
                handle.abort();
            }
        }
        Ok(())
    }

    /// Start the job if a slot is due and nothing is running. Returns
    /// whether a run was started.
    pub fn tick(&mut self, now: DateTime<Local>) -> bool {
        let now_naive = now.naive_local();
        let due = self.schedule.is_due(now_naive, self.last_started);

        if let Some(handle) = &self.in_flight {
            if !handle.is_finished() {
                if due && !self.overrun_reported {
                    warn!("Slot is due but the previous run is still going; waiting for it");
                    self.overrun_reported = true;
                }
                return false;
            }
            self.in_flight = None;
            self.overrun_reported = false;
        }

        if !due {
            return false;
        }

        info!(slot = %self.schedule.slot_for(now_naive), "Starting scheduled run");
        self.last_started = Some(now_naive);
        let job = Arc::clone(&self.job);
        let store = self.store.clone();
        let started_at = now.with_timezone(&Utc);
        self.in_flight = Some(tokio::spawn(async move {
            job().await;
            if let Err(e) = store.save(started_at).await {
                warn!(error = %e, "Could not record last run");
            }
            info!("Scheduled run finished");
        }));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn local(naive: NaiveDateTime) -> DateTime<Local> {
        Local.from_local_datetime(&naive).single().unwrap()
    }

    fn half_past_eight() -> DailySchedule {
        DailySchedule::new(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
    }

    #[test]
    fn test_not_due_before_slot() {
        assert!(!half_past_eight().is_due(at(10, 8, 29), None));
    }

    #[test]
    fn test_due_at_and_after_slot() {
        let schedule = half_past_eight();
        assert!(schedule.is_due(at(10, 8, 30), None));
        assert!(schedule.is_due(at(10, 23, 59), Some(at(9, 8, 30))));
    }

    #[test]
    fn test_not_due_twice_a_day() {
        let schedule = half_past_eight();
        assert!(!schedule.is_due(at(10, 8, 31), Some(at(10, 8, 30))));
        assert!(!schedule.is_due(at(10, 20, 0), Some(at(10, 9, 0))));
        assert!(schedule.is_due(at(11, 8, 30), Some(at(10, 8, 30))));
    }

    #[test]
    fn test_next_slot() {
        let schedule = half_past_eight();
        assert_eq!(schedule.next_slot(at(10, 7, 0)), at(10, 8, 30));
        assert_eq!(schedule.next_slot(at(10, 8, 30)), at(11, 8, 30));
        assert_eq!(schedule.next_slot(at(10, 12, 0)), at(11, 8, 30));
    }

    #[tokio::test]
    async fn test_store_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LastRunStore::new(dir.path().join("state/last_run.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let when = Utc.with_ymd_and_hms(2024, 6, 10, 6, 30, 0).unwrap();
        store.save(when).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(when));
    }

    #[tokio::test]
    async fn test_corrupt_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_run.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(LastRunStore::new(path).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_without_state_skips_past_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = LastRunStore::new(dir.path().join("last_run.json"));
        let mut scheduler = Scheduler::new(half_past_eight(), store, || async {});

        scheduler.restore(local(at(10, 10, 0))).await.unwrap();
        assert!(!scheduler.tick(local(at(10, 10, 0))));
        assert!(scheduler.tick(local(at(11, 8, 30))));
    }

    #[tokio::test]
    async fn test_restore_with_old_state_catches_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = LastRunStore::new(dir.path().join("last_run.json"));
        store
            .save(local(at(9, 8, 30)).with_timezone(&Utc))
            .await
            .unwrap();
        let mut scheduler = Scheduler::new(half_past_eight(), store, || async {});

        scheduler.restore(local(at(10, 10, 0))).await.unwrap();
        assert!(scheduler.tick(local(at(10, 10, 0))));
    }

    #[tokio::test]
    async fn test_single_flight_and_recorded_run() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("last_run.json");
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let job = move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        };
        let mut scheduler =
            Scheduler::new(half_past_eight(), LastRunStore::new(state_path.clone()), job);

        assert!(scheduler.tick(local(at(10, 8, 30))));
        // next day's slot comes due while the first run is still going
        assert!(!scheduler.tick(local(at(11, 8, 30))));
        assert!(!scheduler.tick(local(at(11, 8, 31))));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let recorded = LastRunStore::new(state_path).load().await.unwrap().unwrap();
        assert_eq!(recorded, local(at(10, 8, 30)).with_timezone(&Utc));

        // the skipped slot runs once the previous run is done
        assert!(scheduler.tick(local(at(11, 8, 32))));
        assert!(!scheduler.tick(local(at(11, 8, 33))));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
