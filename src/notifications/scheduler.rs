//! Background reminder jobs and the once-a-minute loop that fires them.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{NotificationSubscription, Preference, Task, User};
use crate::notifications::digest::{OverdueReport, WeeklyDigest};
use crate::notifications::email::{Delivery, EmailService};
use crate::notifications::store::ReminderStore;
use crate::notifications::windows::TimeRange;

/// How often the loop checks whether a job is due.
const TICK_SECS: u64 = 60;

/// When a job fires, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { hour: u32, min: u32 },
    Weekly { weekday: Weekday, hour: u32, min: u32 },
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily { hour, min } => write!(f, "daily at {hour:02}:{min:02} UTC"),
            Self::Weekly { weekday, hour, min } => {
                write!(f, "every {weekday} at {hour:02}:{min:02} UTC")
            }
        }
    }
}

impl Schedule {
    /// The latest scheduled instant at or before `now`.
    pub fn most_recent_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = TimeRange::day_of(now).start;
        let (base, period) = match *self {
            Self::Daily { hour, min } => (midnight + time_of_day(hour, min), Duration::days(1)),
            Self::Weekly { weekday, hour, min } => {
                let days_back = (7 + now.weekday().num_days_from_monday()
                    - weekday.num_days_from_monday())
                    % 7;
                (
                    midnight - Duration::days(i64::from(days_back)) + time_of_day(hour, min),
                    Duration::days(7),
                )
            }
        };
        if base <= now {
            base
        } else {
            base - period
        }
    }

    /// Due when an occurrence has passed since `last_run`.
    pub fn is_due(&self, now: DateTime<Utc>, last_run: DateTime<Utc>) -> bool {
        self.most_recent_occurrence(now) > last_run
    }
}

fn time_of_day(hour: u32, min: u32) -> Duration {
    Duration::hours(i64::from(hour)) + Duration::minutes(i64::from(min))
}

/// The scheduled notification jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ReminderJob {
    UpcomingReminders,
    DueToday,
    OverdueReport,
    WeeklyDigest,
}

impl ReminderJob {
    pub const ALL: [ReminderJob; 4] = [
        ReminderJob::DueToday,
        ReminderJob::UpcomingReminders,
        ReminderJob::OverdueReport,
        ReminderJob::WeeklyDigest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReminderJob::UpcomingReminders => "upcoming-reminders",
            ReminderJob::DueToday => "due-today",
            ReminderJob::OverdueReport => "overdue-report",
            ReminderJob::WeeklyDigest => "weekly-digest",
        }
    }

    pub fn schedule(&self) -> Schedule {
        match self {
            ReminderJob::UpcomingReminders => Schedule::Daily { hour: 9, min: 0 },
            ReminderJob::DueToday => Schedule::Daily { hour: 8, min: 0 },
            ReminderJob::OverdueReport => Schedule::Daily { hour: 10, min: 0 },
            ReminderJob::WeeklyDigest => Schedule::Weekly {
                weekday: Weekday::Mon,
                hour: 7,
                min: 0,
            },
        }
    }

    /// Subscribers must have this flag on to receive the job's emails.
    pub fn preference(&self) -> Preference {
        match self {
            ReminderJob::UpcomingReminders => Preference::TaskReminders,
            ReminderJob::DueToday | ReminderJob::OverdueReport => Preference::DueDateAlerts,
            ReminderJob::WeeklyDigest => Preference::WeeklyDigest,
        }
    }
}

impl fmt::Display for ReminderJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub subscribers: usize,
    pub emails_sent: usize,
    pub skipped: usize,
    pub failures: usize,
}

/// Runs the reminder jobs against a [`ReminderStore`], sending through an [`EmailService`].
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    email: EmailService,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn ReminderStore>, email: EmailService) -> Self {
        Self { store, email }
    }

    /// Spawns the loop. Jobs whose time already passed today do not fire on boot.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let started = Utc::now();
            let mut last_runs: HashMap<ReminderJob, DateTime<Utc>> =
                ReminderJob::ALL.iter().map(|job| (*job, started)).collect();

            for job in ReminderJob::ALL {
                log::info!("scheduled {} ({})", job, job.schedule());
            }

            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(TICK_SECS));
            loop {
                ticker.tick().await;
                self.tick(&mut last_runs, Utc::now()).await;
            }
        })
    }

    /// Runs every job that has come due since its last run and returns them.
    pub async fn tick(
        &self,
        last_runs: &mut HashMap<ReminderJob, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<ReminderJob> {
        let mut ran = Vec::new();
        for job in ReminderJob::ALL {
            let last_run = *last_runs.entry(job).or_insert(now);
            if !job.schedule().is_due(now, last_run) {
                continue;
            }
            last_runs.insert(job, now);

            match self.run_job(job, now).await {
                Ok(report) => log::info!(
                    "{} finished: {} subscriber(s), {} email(s) sent, {} skipped, {} failed",
                    job,
                    report.subscribers,
                    report.emails_sent,
                    report.skipped,
                    report.failures
                ),
                Err(e) => log::error!("{} failed: {}", job, e),
            }
            ran.push(job);
        }
        ran
    }

    /// Runs `job` once for every matching subscriber. Per-subscriber failures
    /// are logged and counted; only failing to list subscribers is an error.
    pub async fn run_job(&self, job: ReminderJob, now: DateTime<Utc>) -> Result<JobReport, AppError> {
        let subscriptions = self.store.active_subscriptions(job.preference()).await?;
        log::info!("running {} for {} subscriber(s)", job, subscriptions.len());

        let mut report = JobReport {
            subscribers: subscriptions.len(),
            ..JobReport::default()
        };

        for subscription in &subscriptions {
            let user = match self.store.find_user(subscription.user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    log::warn!(
                        "{}: subscription {} belongs to missing user {}",
                        job,
                        subscription.id,
                        subscription.user_id
                    );
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("{}: loading user {} failed: {}", job, subscription.user_id, e);
                    report.failures += 1;
                    continue;
                }
            };

            if let Err(e) = self.notify(job, subscription, &user, now, &mut report).await {
                log::error!("{}: notifying user {} failed: {}", job, user.id, e);
                report.failures += 1;
            }
        }

        Ok(report)
    }

    /// Sends `job`'s emails for one subscriber, adding to `report`. A failed task
    /// reminder is counted and the remaining reminders still go out; an error is
    /// returned only when nothing could be attempted or the single report email failed.
    async fn notify(
        &self,
        job: ReminderJob,
        subscription: &NotificationSubscription,
        user: &User,
        now: DateTime<Utc>,
        report: &mut JobReport,
    ) -> Result<(), AppError> {
        let to = subscription.email.as_str();

        match job {
            ReminderJob::UpcomingReminders => {
                let tasks = self
                    .store
                    .pending_tasks_due_in(user.id, TimeRange::upcoming(now))
                    .await?;
                for task in &tasks {
                    let sent = self.email.send_task_reminder(to, task, None, None, now).await;
                    record_reminder(job, task, sent, report);
                }
            }
            ReminderJob::DueToday => {
                let tasks = self
                    .store
                    .pending_tasks_due_in(user.id, TimeRange::day_of(now))
                    .await?;
                for task in &tasks {
                    let subject = format!("Due today: {}", task.title);
                    let intro = format!("Your task \"{}\" is due today.", task.title);
                    let sent = self
                        .email
                        .send_task_reminder(to, task, Some(&subject), Some(&intro), now)
                        .await;
                    record_reminder(job, task, sent, report);
                }
            }
            ReminderJob::OverdueReport => {
                let overdue = self.store.overdue_tasks(user.id, now).await?;
                if let Some(overdue) = OverdueReport::build(overdue, now) {
                    log::debug!("user {}: {} overdue task(s)", user.id, overdue.total());
                    self.email.send_overdue_report(to, user, &overdue).await?;
                    report.emails_sent += 1;
                }
            }
            ReminderJob::WeeklyDigest => {
                let week = TimeRange::week_of(now);
                let week_tasks = self.store.tasks_due_in(user.id, week).await?;
                let overdue = self.store.overdue_tasks(user.id, week.start).await?;
                let completed = self.store.completed_in(user.id, week).await?;

                if let Some(digest) = WeeklyDigest::build(week, now, week_tasks, overdue, completed) {
                    self.email.send_weekly_digest(to, user, &digest).await?;
                    report.emails_sent += 1;
                }
            }
        }
        Ok(())
    }
}

fn record_reminder(job: ReminderJob, task: &Task, sent: Result<Delivery, AppError>, report: &mut JobReport) {
    match sent {
        Ok(_) => report.emails_sent += 1,
        Err(e) => {
            log::error!("{}: reminder for task {} failed: {}", job, task.id, e);
            report.failures += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use crate::models::{NotificationPreferences, Task, TaskPriority};
    use crate::notifications::email::tests::RecordingMailer;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[derive(Default)]
    struct MemoryStore {
        users: Vec<User>,
        subscriptions: Vec<NotificationSubscription>,
        tasks: Vec<Task>,
    }

    impl MemoryStore {
        fn select(&self, user_id: i32, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
            let mut tasks: Vec<Task> = self
                .tasks
                .iter()
                .filter(|task| task.user_id == user_id && keep(task))
                .cloned()
                .collect();
            tasks.sort_by_key(|task| task.due_date);
            tasks
        }
    }

    #[async_trait]
    impl ReminderStore for MemoryStore {
        async fn active_subscriptions(
            &self,
            preference: Preference,
        ) -> Result<Vec<NotificationSubscription>, AppError> {
            Ok(self
                .subscriptions
                .iter()
                .filter(|s| s.active && preference.is_enabled_in(&s.preferences))
                .cloned()
                .collect())
        }

        async fn find_user(&self, user_id: i32) -> Result<Option<User>, AppError> {
            Ok(self.users.iter().find(|u| u.id == user_id).cloned())
        }

        async fn pending_tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
            Ok(self.select(user_id, |t| !t.completed && range.contains(t.due_date)))
        }

        async fn overdue_tasks(&self, user_id: i32, before: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
            Ok(self.select(user_id, |t| !t.completed && t.due_date < before))
        }

        async fn tasks_due_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
            Ok(self.select(user_id, |t| range.contains(t.due_date)))
        }

        async fn completed_in(&self, user_id: i32, range: TimeRange) -> Result<Vec<Task>, AppError> {
            Ok(self.select(user_id, |t| t.completed && range.contains(t.updated_at)))
        }
    }

    fn user(id: i32, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{}@account.example", name.to_lowercase()),
            created_at: at(2025, 1, 1, 0, 0),
        }
    }

    fn subscription(user_id: i32, email: &str, preferences: NotificationPreferences) -> NotificationSubscription {
        NotificationSubscription {
            id: Uuid::new_v4(),
            user_id,
            email: email.to_string(),
            preferences,
            active: true,
            created_at: at(2025, 1, 1, 0, 0),
            updated_at: at(2025, 1, 1, 0, 0),
        }
    }

    fn task(user_id: i32, title: &str, due: DateTime<Utc>, completed: bool) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            due_date: due,
            user_time_zone: "UTC".to_string(),
            timezone_offset: 0,
            priority: TaskPriority::Medium,
            completed,
            user_id,
            created_at: due - Duration::days(14),
            updated_at: due,
        }
    }

    fn scheduler(store: MemoryStore, mailer: Arc<RecordingMailer>) -> ReminderScheduler {
        ReminderScheduler::new(Arc::new(store), EmailService::new(mailer, "https://app.example"))
    }

    #[test]
    fn test_daily_most_recent_occurrence() {
        let schedule = Schedule::Daily { hour: 9, min: 0 };
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 11, 9, 30)),
            at(2025, 6, 11, 9, 0)
        );
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 11, 9, 0)),
            at(2025, 6, 11, 9, 0)
        );
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 11, 8, 59)),
            at(2025, 6, 10, 9, 0)
        );
    }

    #[test]
    fn test_weekly_most_recent_occurrence() {
        let schedule = ReminderJob::WeeklyDigest.schedule();
        // 2025-06-09 is a Monday.
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 11, 12, 0)),
            at(2025, 6, 9, 7, 0)
        );
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 9, 6, 59)),
            at(2025, 6, 2, 7, 0)
        );
        assert_eq!(
            schedule.most_recent_occurrence(at(2025, 6, 15, 23, 0)),
            at(2025, 6, 9, 7, 0)
        );
        assert_eq!(schedule.to_string(), "every Mon at 07:00 UTC");
    }

    #[test]
    fn test_is_due_only_after_a_new_occurrence() {
        let schedule = Schedule::Daily { hour: 8, min: 0 };
        let booted = at(2025, 6, 11, 12, 0);

        assert!(!schedule.is_due(at(2025, 6, 11, 12, 1), booted));
        assert!(!schedule.is_due(at(2025, 6, 12, 7, 59), booted));
        assert!(schedule.is_due(at(2025, 6, 12, 8, 0), booted));
        assert!(!schedule.is_due(at(2025, 6, 12, 8, 1), at(2025, 6, 12, 8, 0)));
    }

    #[test]
    fn test_jobs_map_to_preferences() {
        assert_eq!(ReminderJob::UpcomingReminders.preference(), Preference::TaskReminders);
        assert_eq!(ReminderJob::DueToday.preference(), Preference::DueDateAlerts);
        assert_eq!(ReminderJob::OverdueReport.preference(), Preference::DueDateAlerts);
        assert_eq!(ReminderJob::WeeklyDigest.preference(), Preference::WeeklyDigest);
        assert_eq!(ReminderJob::DueToday.to_string(), "due-today");
    }

    #[test_log::test(actix_rt::test)]
    async fn test_tick_runs_only_jobs_that_came_due() {
        let scheduler = scheduler(MemoryStore::default(), Arc::new(RecordingMailer::default()));
        let booted = at(2025, 6, 11, 8, 30);
        let mut last_runs: HashMap<ReminderJob, DateTime<Utc>> =
            ReminderJob::ALL.iter().map(|job| (*job, booted)).collect();

        assert!(scheduler.tick(&mut last_runs, at(2025, 6, 11, 8, 31)).await.is_empty());
        assert_eq!(
            scheduler.tick(&mut last_runs, at(2025, 6, 11, 9, 0)).await,
            vec![ReminderJob::UpcomingReminders]
        );
        assert!(scheduler.tick(&mut last_runs, at(2025, 6, 11, 9, 1)).await.is_empty());
        assert_eq!(
            scheduler.tick(&mut last_runs, at(2025, 6, 11, 10, 0)).await,
            vec![ReminderJob::OverdueReport]
        );
    }

    #[actix_rt::test]
    async fn test_upcoming_reminders_go_to_subscription_email() {
        let now = at(2025, 6, 11, 9, 0);
        let store = MemoryStore {
            users: vec![user(1, "Ana")],
            subscriptions: vec![subscription(1, "alerts@ana.example", NotificationPreferences::default())],
            tasks: vec![
                task(1, "Soon", now + Duration::hours(5), false),
                task(1, "Edge", now + Duration::hours(48), false),
                task(1, "Done", now + Duration::hours(6), true),
                task(1, "Late", now - Duration::hours(1), false),
            ],
        };
        let mailer = Arc::new(RecordingMailer::default());

        let report = scheduler(store, mailer.clone())
            .run_job(ReminderJob::UpcomingReminders, now)
            .await
            .unwrap();

        assert_eq!(report.emails_sent, 1);
        let sent = mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alerts@ana.example");
        assert!(sent[0].html.contains("Soon"));
    }

    #[actix_rt::test]
    async fn test_due_today_uses_due_today_wording() {
        let now = at(2025, 6, 11, 8, 0);
        let store = MemoryStore {
            users: vec![user(1, "Ana")],
            subscriptions: vec![subscription(1, "ana@example.com", NotificationPreferences::default())],
            tasks: vec![
                task(1, "Dentist", at(2025, 6, 11, 16, 0), false),
                task(1, "Tomorrow", at(2025, 6, 12, 0, 0), false),
            ],
        };
        let mailer = Arc::new(RecordingMailer::default());

        scheduler(store, mailer.clone())
            .run_job(ReminderJob::DueToday, now)
            .await
            .unwrap();

        let sent = mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Due today: Dentist");
        assert!(sent[0].text.starts_with("Your task \"Dentist\" is due today."));
    }

    #[actix_rt::test]
    async fn test_failed_reminder_does_not_stop_the_rest() {
        let now = at(2025, 6, 11, 8, 0);
        let store = MemoryStore {
            users: vec![user(1, "Ana")],
            subscriptions: vec![subscription(1, "ana@example.com", NotificationPreferences::default())],
            tasks: vec![
                task(1, "Gym", at(2025, 6, 11, 9, 0), false),
                task(1, "Dentist", at(2025, 6, 11, 16, 0), false),
                task(1, "Call mum", at(2025, 6, 11, 20, 0), false),
            ],
        };
        let mailer = Arc::new(RecordingMailer::failing_on_subject("Due today: Gym"));

        let report = scheduler(store, mailer.clone())
            .run_job(ReminderJob::DueToday, now)
            .await
            .unwrap();

        assert_eq!(
            report,
            JobReport {
                subscribers: 1,
                emails_sent: 2,
                skipped: 0,
                failures: 1,
            }
        );
        let subjects: Vec<String> = mailer.messages().into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, vec!["Due today: Dentist", "Due today: Call mum"]);
    }

    #[actix_rt::test]
    async fn test_missing_users_and_failures_do_not_stop_the_job() {
        let now = at(2025, 6, 11, 10, 0);
        let store = MemoryStore {
            users: vec![user(1, "Ana"), user(2, "Ben")],
            subscriptions: vec![
                subscription(1, "ana@example.com", NotificationPreferences::default()),
                subscription(99, "ghost@example.com", NotificationPreferences::default()),
                subscription(2, "ben@example.com", NotificationPreferences::default()),
            ],
            tasks: vec![
                task(1, "Taxes", now - Duration::days(5), false),
                task(2, "Report", now - Duration::hours(2), false),
            ],
        };
        let mailer = Arc::new(RecordingMailer::failing_for("ana@example.com"));

        let report = scheduler(store, mailer.clone())
            .run_job(ReminderJob::OverdueReport, now)
            .await
            .unwrap();

        assert_eq!(
            report,
            JobReport {
                subscribers: 3,
                emails_sent: 1,
                skipped: 1,
                failures: 1,
            }
        );
        let sent = mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ben@example.com");
        assert!(sent[0].html.contains("Overdue in the last 24 hours (1)"));
    }

    #[actix_rt::test]
    async fn test_overdue_report_skips_users_without_overdue_tasks() {
        let now = at(2025, 6, 11, 10, 0);
        let store = MemoryStore {
            users: vec![user(1, "Ana")],
            subscriptions: vec![subscription(1, "ana@example.com", NotificationPreferences::default())],
            tasks: vec![
                task(1, "Future", now + Duration::days(1), false),
                task(1, "Finished", now - Duration::days(1), true),
            ],
        };
        let mailer = Arc::new(RecordingMailer::default());

        let report = scheduler(store, mailer.clone())
            .run_job(ReminderJob::OverdueReport, now)
            .await
            .unwrap();

        assert_eq!(report.emails_sent, 0);
        assert!(mailer.messages().is_empty());
    }

    #[actix_rt::test]
    async fn test_weekly_digest_respects_preference_and_sections() {
        let now = at(2025, 6, 9, 7, 0);
        let digest_on = NotificationPreferences {
            weekly_digest: true,
            ..NotificationPreferences::default()
        };
        let store = MemoryStore {
            users: vec![user(1, "Ana"), user(2, "Ben")],
            subscriptions: vec![
                subscription(1, "ana@example.com", digest_on),
                subscription(2, "ben@example.com", NotificationPreferences::default()),
            ],
            tasks: vec![
                task(1, "Review", at(2025, 6, 12, 12, 0), false),
                task(1, "Old invoice", at(2025, 6, 1, 12, 0), false),
                task(2, "Ben's task", at(2025, 6, 12, 12, 0), false),
            ],
        };
        let mailer = Arc::new(RecordingMailer::default());

        let report = scheduler(store, mailer.clone())
            .run_job(ReminderJob::WeeklyDigest, now)
            .await
            .unwrap();

        assert_eq!(report.subscribers, 1);
        let sent = mailer.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].html.contains("Due this week (1)"));
        assert!(sent[0].html.contains("Still overdue from earlier (1)"));
        assert!(!sent[0].html.contains("Ben"));
    }
}
