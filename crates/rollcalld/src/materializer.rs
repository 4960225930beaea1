//! Periodic absent-row materializer.
//!
//! Every tick finds the sessions that STARTED inside the window since the
//! previous tick and seeds a baseline absent row for each approved
//! enrollee. Identification later flips the row to present; a row that
//! never flips is the absence record. Seeding is keyed on the ledger's
//! primary key, so re-running a tick (or racing an identification) never
//! duplicates or overwrites anything.

use crate::config::Config;
use chrono::{Datelike, Local, NaiveDateTime, NaiveTime};
use rollcall_core::schedule::{ScheduleEntry, Weekday};
use rollcall_store::{Store, StoreError};
use std::time::Duration;
use tokio::sync::watch;

pub struct Materializer {
    store: Store,
    tick_interval: Duration,
}

impl Materializer {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            tick_interval: config.tick_interval(),
        }
    }

    /// Tick until `shutdown` flips to true. Tick failures are logged and
    /// the loop keeps going; a missed window self-heals because seeding
    /// is idempotent and identification does not depend on it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(period_secs = self.tick_interval.as_secs(), "materializer started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick(Local::now().naive_local()).await {
                        tracing::warn!(%err, "materializer tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("materializer stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Seed absent rows for every session whose start time falls in
    /// `(now - tick_interval, now]` on today's weekday. Returns the number
    /// of rows created.
    pub async fn tick(&self, now: NaiveDateTime) -> Result<usize, StoreError> {
        let weekday = Weekday::from(now.date().weekday());
        let entries = self.store.entries_for_weekday(weekday).await?;

        let window_start = now - chrono::Duration::seconds(self.tick_interval.as_secs() as i64);
        // A window that crosses midnight clamps to today; yesterday's
        // sessions belong to yesterday's ticks.
        let floor = if window_start.date() == now.date() {
            window_start.time()
        } else {
            NaiveTime::MIN
        };

        let mut created = 0;
        for entry in entries
            .iter()
            .filter(|e| floor <= e.start_time && e.start_time <= now.time())
        {
            match self.seed_entry(entry, now).await {
                Ok(n) => created += n,
                Err(err) => {
                    tracing::warn!(course = %entry.course_id, %err, "seeding failed, continuing");
                }
            }
        }
        if created > 0 {
            tracing::info!(created, %weekday, "materializer seeded absent rows");
        }
        Ok(created)
    }

    async fn seed_entry(
        &self,
        entry: &ScheduleEntry,
        now: NaiveDateTime,
    ) -> Result<usize, StoreError> {
        let students = self.store.approved_students(entry.course_id).await?;
        let mut created = 0;
        for student in students {
            if self
                .store
                .insert_absent(student, entry.course_id, now.date())
                .await?
            {
                created += 1;
            }
        }
        Ok(created)
    }
}
