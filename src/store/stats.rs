//! Aggregate statistics over the `emails` table.
//!
//! Ratios and averages are computed in SQL and rounded to one decimal place.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{ts_to_db, EmailStore, SqliteEmailStore, StoreError};
use crate::classifier::{Priority, Sentiment};

const MS_PER_HOUR: &str = "3600000.0";
const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Headline counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// All emails.
    pub total_emails: i64,
    /// Emails labelled urgent.
    pub urgent_emails: i64,
    /// Emails awaiting a reply.
    pub pending_emails: i64,
    /// Emails closed by an operator.
    pub resolved_emails: i64,
    /// Resolved share of all emails, in percent.
    pub response_rate: f64,
}

/// Email counts per sentiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentimentBreakdown {
    /// Positive emails.
    pub positive: i64,
    /// Negative emails.
    pub negative: i64,
    /// Neutral emails.
    pub neutral: i64,
}

impl SentimentBreakdown {
    fn add(&mut self, sentiment: &str, count: i64) {
        match sentiment.parse::<Sentiment>() {
            Ok(Sentiment::Positive) => self.positive = count,
            Ok(Sentiment::Negative) => self.negative = count,
            Ok(Sentiment::Neutral) => self.neutral = count,
            Err(_) => {}
        }
    }
}

/// One line of the dashboard activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    /// Email id.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Queue priority.
    pub priority: Priority,
    /// Body tone.
    pub sentiment: Sentiment,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// Everything the dashboard landing page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Headline counters.
    #[serde(flatten)]
    pub overview: Overview,
    /// Counts per sentiment.
    pub sentiment_breakdown: SentimentBreakdown,
    /// Ten newest emails of the last 24 hours.
    pub recent_activity: Vec<RecentActivity>,
    /// Mean receipt-to-reply time in hours, when any reply was sent.
    pub avg_response_time: Option<f64>,
}

/// Per-sentiment detail row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentDetail {
    /// Sentiment label.
    pub sentiment: String,
    /// Emails with this label.
    pub count: i64,
    /// Mean response time in milliseconds.
    pub avg_response_time: Option<f64>,
}

/// Sentiment distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentStats {
    /// Counts per sentiment.
    pub breakdown: SentimentBreakdown,
    /// Detail rows, most frequent first.
    pub details: Vec<SentimentDetail>,
    /// Sum of all counts.
    pub total: i64,
}

/// Per-priority row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityStat {
    /// Priority label.
    pub priority: String,
    /// Emails with this label.
    pub count: i64,
    /// Of which pending.
    pub pending: i64,
    /// Of which resolved.
    pub resolved: i64,
}

/// Per-category row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    /// Category label.
    pub category: String,
    /// Emails in this category.
    pub count: i64,
    /// Of which urgent.
    pub urgent_count: i64,
    /// Mean sentiment with positive = 1, neutral = 0, negative = -1.
    pub avg_sentiment: f64,
}

/// Timeline window and bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelinePeriod {
    /// Hourly buckets over the last 24 hours.
    Day,
    /// Daily buckets over the last 7 days.
    Week,
    /// Weekly buckets over the last 30 days.
    Month,
}

impl TimelinePeriod {
    fn window(self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    fn bucket_format(self) -> &'static str {
        match self {
            Self::Day => "%Y-%m-%dT%H:00",
            Self::Week => "%Y-%m-%d",
            Self::Month => "%Y-W%W",
        }
    }
}

impl FromStr for TimelinePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err("Invalid period. Use: day, week, or month".to_owned()),
        }
    }
}

/// One timeline bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    /// Bucket label (`2026-10-19T14:00`, `2026-10-19` or `2026-W42`).
    pub bucket: String,
    /// Emails received in the bucket.
    pub total_emails: i64,
    /// Of which urgent.
    pub urgent_emails: i64,
    /// Of which positive.
    pub positive_emails: i64,
    /// Of which negative.
    pub negative_emails: i64,
    /// Of which resolved.
    pub resolved_emails: i64,
}

/// Timeline series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Requested period.
    pub period: TimelinePeriod,
    /// Buckets in chronological order.
    pub timeline: Vec<TimelineBucket>,
    /// Window start.
    pub from: DateTime<Utc>,
    /// Window end.
    pub to: DateTime<Utc>,
}

/// Throughput and resolution metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// All emails.
    pub total_emails: i64,
    /// Received in the last 24 hours.
    pub emails_last_24h: i64,
    /// Received in the last 7 days.
    pub emails_last_7d: i64,
    /// Mean response time of resolved emails, in hours.
    pub avg_response_time: Option<f64>,
    /// Resolved share of all emails, in percent.
    pub resolution_rate: f64,
    /// Urgent emails that are resolved.
    pub urgent_emails_resolved: i64,
    /// Mean emails per day over the last week.
    pub daily_average: f64,
    /// Last day's volume against the weekly average, in percent.
    pub weekly_growth: f64,
}

/// Per-sender row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSender {
    /// Sender address.
    pub sender: String,
    /// Emails from this sender.
    pub email_count: i64,
    /// Of which urgent.
    pub urgent_count: i64,
    /// Newest email from this sender.
    pub last_email_at: DateTime<Utc>,
    /// Mean sentiment with positive = 1, neutral = 0, negative = -1.
    pub avg_sentiment: f64,
}

const SENTIMENT_VALUE: &str =
    "CASE sentiment WHEN 'positive' THEN 1.0 WHEN 'negative' THEN -1.0 ELSE 0.0 END";

fn since(window: Duration) -> String {
    let cutoff = Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    ts_to_db(&cutoff)
}

impl SqliteEmailStore {
    /// Headline counters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn overview(&self) -> Result<Overview, StoreError> {
        let (total, urgent, pending, resolved, rate): (i64, i64, i64, i64, f64) =
            sqlx::query_as(
                "SELECT COUNT(*),
                        COALESCE(SUM(priority = 'urgent'), 0),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'resolved'), 0),
                        COALESCE(ROUND(100.0 * SUM(status = 'resolved') / COUNT(*), 1), 0.0)
                 FROM emails",
            )
            .fetch_one(self.pool())
            .await?;

        Ok(Overview {
            total_emails: total,
            urgent_emails: urgent,
            pending_emails: pending,
            resolved_emails: resolved,
            response_rate: rate,
        })
    }

    /// Dashboard summary: overview, sentiment counts, recent activity and mean response time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn dashboard(&self) -> Result<DashboardStats, StoreError> {
        let overview = self.overview().await?;
        let sentiment = self.sentiment_stats().await?;
        let recent_activity = self
            .find_recent(24)
            .await?
            .into_iter()
            .take(RECENT_ACTIVITY_LIMIT)
            .map(|e| RecentActivity {
                id: e.id,
                subject: e.subject,
                sender: e.sender_email,
                priority: e.priority,
                sentiment: e.sentiment,
                created_at: e.created_at,
            })
            .collect();

        let (avg_response_time,): (Option<f64>,) = sqlx::query_as(&format!(
            "SELECT ROUND(AVG(response_time_ms) / {MS_PER_HOUR}, 1)
             FROM emails WHERE response_time_ms IS NOT NULL"
        ))
        .fetch_one(self.pool())
        .await?;

        Ok(DashboardStats {
            overview,
            sentiment_breakdown: sentiment.breakdown,
            recent_activity,
            avg_response_time,
        })
    }

    /// Sentiment distribution with mean response time per label.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn sentiment_stats(&self) -> Result<SentimentStats, StoreError> {
        let rows: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            "SELECT sentiment, COUNT(*) AS n, AVG(response_time_ms)
             FROM emails GROUP BY sentiment ORDER BY n DESC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut breakdown = SentimentBreakdown::default();
        let mut total: i64 = 0;
        let details = rows
            .into_iter()
            .map(|(sentiment, count, avg_response_time)| {
                breakdown.add(&sentiment, count);
                total = total.saturating_add(count);
                SentimentDetail {
                    sentiment,
                    count,
                    avg_response_time,
                }
            })
            .collect();

        Ok(SentimentStats {
            breakdown,
            details,
            total,
        })
    }

    /// Per-priority counts with pending and resolved subtotals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn priority_stats(&self) -> Result<Vec<PriorityStat>, StoreError> {
        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            "SELECT priority, COUNT(*),
                    COALESCE(SUM(status = 'pending'), 0),
                    COALESCE(SUM(status = 'resolved'), 0)
             FROM emails GROUP BY priority
             ORDER BY CASE priority WHEN 'urgent' THEN 0 ELSE 1 END",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(priority, count, pending, resolved)| PriorityStat {
                priority,
                count,
                pending,
                resolved,
            })
            .collect())
    }

    /// Per-category counts, most frequent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn category_stats(&self) -> Result<Vec<CategoryStat>, StoreError> {
        let rows: Vec<(String, i64, i64, f64)> = sqlx::query_as(&format!(
            "SELECT category, COUNT(*) AS n,
                    COALESCE(SUM(priority = 'urgent'), 0),
                    COALESCE(AVG({SENTIMENT_VALUE}), 0.0)
             FROM emails GROUP BY category ORDER BY n DESC"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count, urgent_count, avg_sentiment)| CategoryStat {
                category,
                count,
                urgent_count,
                avg_sentiment,
            })
            .collect())
    }

    /// Bucketed volume over the given period.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn timeline(&self, period: TimelinePeriod) -> Result<Timeline, StoreError> {
        let to = Utc::now();
        let from = to
            .checked_sub_signed(period.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let timeline: Vec<TimelineBucket> = sqlx::query_as(
            "SELECT strftime(?1, received_at) AS bucket,
                    COUNT(*) AS total_emails,
                    COALESCE(SUM(priority = 'urgent'), 0) AS urgent_emails,
                    COALESCE(SUM(sentiment = 'positive'), 0) AS positive_emails,
                    COALESCE(SUM(sentiment = 'negative'), 0) AS negative_emails,
                    COALESCE(SUM(status = 'resolved'), 0) AS resolved_emails
             FROM emails
             WHERE received_at >= ?2
             GROUP BY bucket
             ORDER BY bucket ASC",
        )
        .bind(period.bucket_format())
        .bind(ts_to_db(&from))
        .fetch_all(self.pool())
        .await?;

        Ok(Timeline {
            period,
            timeline,
            from,
            to,
        })
    }

    /// Throughput and resolution metrics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn performance(&self) -> Result<Performance, StoreError> {
        let (total, last_24h, last_7d, resolution_rate, urgent_resolved, daily_average, growth): (
            i64,
            i64,
            i64,
            f64,
            i64,
            f64,
            f64,
        ) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(received_at >= ?1), 0),
                    COALESCE(SUM(received_at >= ?2), 0),
                    COALESCE(ROUND(100.0 * SUM(status = 'resolved') / COUNT(*), 1), 0.0),
                    COALESCE(SUM(priority = 'urgent' AND status = 'resolved'), 0),
                    COALESCE(ROUND(SUM(received_at >= ?2) / 7.0, 1), 0.0),
                    COALESCE(ROUND(
                        (SUM(received_at >= ?1) * 7.0 / NULLIF(SUM(received_at >= ?2), 0) - 1.0)
                            * 100.0, 1), 0.0)
             FROM emails",
        )
        .bind(since(Duration::hours(24)))
        .bind(since(Duration::days(7)))
        .fetch_one(self.pool())
        .await?;

        let (avg_response_time,): (Option<f64>,) = sqlx::query_as(&format!(
            "SELECT ROUND(AVG(response_time_ms) / {MS_PER_HOUR}, 1)
             FROM emails WHERE status = 'resolved'"
        ))
        .fetch_one(self.pool())
        .await?;

        Ok(Performance {
            total_emails: total,
            emails_last_24h: last_24h,
            emails_last_7d: last_7d,
            avg_response_time,
            resolution_rate,
            urgent_emails_resolved: urgent_resolved,
            daily_average,
            weekly_growth: growth,
        })
    }

    /// Most frequent senders.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn top_senders(&self, limit: u32) -> Result<Vec<TopSender>, StoreError> {
        let rows: Vec<(String, i64, i64, String, f64)> = sqlx::query_as(&format!(
            "SELECT sender_email, COUNT(*) AS n,
                    COALESCE(SUM(priority = 'urgent'), 0),
                    MAX(received_at),
                    COALESCE(AVG({SENTIMENT_VALUE}), 0.0)
             FROM emails GROUP BY sender_email ORDER BY n DESC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|(sender, email_count, urgent_count, last, avg_sentiment)| {
                Ok(TopSender {
                    sender,
                    email_count,
                    urgent_count,
                    last_email_at: super::ts_from_db("received_at", &last)?,
                    avg_sentiment,
                })
            })
            .collect()
    }
}
