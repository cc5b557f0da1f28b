use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::Context;
use crate::error::WorkflowResult;
use crate::models::{format_instant, Match, MatchStatus, OutgoingNotification};
use crate::store::{self, Order, Query, MATCHES};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub reminders: usize,
    pub rating_requests: usize,
}

/// Periodic pass that sends match reminders and post-match rating requests.
#[derive(Clone)]
pub struct ReminderSweep {
    ctx: Context,
}

impl ReminderSweep {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> WorkflowResult<SweepReport> {
        let docs = self
            .ctx
            .store
            .query(MATCHES, &Query::new().order_by("dateTime", Order::Asc))
            .await?;

        let mut report = SweepReport::default();
        for doc in docs {
            let (doc_id, version) = (doc.id.clone(), doc.version);
            let m: Match = match store::from_document(doc) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(match_id = %doc_id, error = %e, "skipping undecodable match");
                    continue;
                }
            };
            let status = m.status(now);

            if status != MatchStatus::Completed
                && m.reminder_sent_at.is_none()
                && m.date_time - now <= self.ctx.settings.reminder_lead
            {
                if self.stamp(&m.id, version, "reminderSentAt", now).await? {
                    let date_time = format!("{} {}", m.date, m.time);
                    for user_id in recipients(&m) {
                        self.ctx.outbox.enqueue(OutgoingNotification::match_reminder(
                            user_id, &m.id, &m.location, &date_time, now,
                        ));
                        report.reminders += 1;
                    }
                }
                continue;
            }

            if status == MatchStatus::Completed
                && !m.participants.is_empty()
                && m.rating_request_sent_at.is_none()
                && self.stamp(&m.id, version, "ratingRequestSentAt", now).await?
            {
                for user_id in &m.participants {
                    self.ctx.outbox.enqueue(OutgoingNotification::rating_request(
                        user_id, &m.id, &m.location, now,
                    ));
                    report.rating_requests += 1;
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                reminders = report.reminders,
                rating_requests = report.rating_requests,
                "reminder sweep queued notifications"
            );
        }
        Ok(report)
    }

    /// Claims a send by stamping `field`; a concurrent sweep that loses the
    /// race sends nothing.
    async fn stamp(
        &self,
        match_id: &str,
        version: i64,
        field: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<bool> {
        let claimed = self
            .ctx
            .store
            .update_if_version(
                MATCHES,
                match_id,
                version,
                json!({ field: format_instant(now) }),
            )
            .await?;
        if !claimed {
            tracing::debug!(
                match_id,
                field,
                "match changed during sweep, leaving it for the next pass"
            );
        }
        Ok(claimed)
    }

    /// Sweeps every `every` until the task is dropped.
    pub async fn run(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep(self.ctx.clock.now()).await {
                tracing::error!("reminder sweep failed: {e}");
            }
        }
    }
}

/// Creator first, then participants, without repeats.
fn recipients(m: &Match) -> Vec<&str> {
    let mut out = vec![m.created_by.as_str()];
    for p in &m.participants {
        if !out.contains(&p.as_str()) {
            out.push(p.as_str());
        }
    }
    out
}
