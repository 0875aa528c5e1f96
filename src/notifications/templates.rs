//! HTML and plain-text bodies for every notification email.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::dates::{days_remaining, describe_elapsed, format_due_date};
use crate::models::{Task, User};
use crate::notifications::digest::{OverdueReport, WeeklyDigest};
use crate::notifications::email::EmailMessage;
use crate::notifications::windows::{DueWindow, OverdueTier};

/// Subject and bodies, not yet addressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl Rendered {
    pub fn addressed_to(self, to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: self.subject,
            text: self.text,
            html: self.html,
        }
    }
}

pub const DEFAULT_REMINDER_SUBJECT: &str = "Reminder: you have a pending task";

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #e0e0e0; border-radius: 5px;">
  <h2 style="color: #333; border-bottom: 2px solid #f0f0f0; padding-bottom: 10px;">{title}</h2>
{body}
</div>"#,
        title = escape_html(title),
        body = body
    )
}

fn button(href: &str, label: &str) -> String {
    format!(
        r#"  <div style="text-align: center; margin-top: 20px;">
    <a href="{href}" style="background-color: #4CAF50; color: white; padding: 10px 20px; text-decoration: none; border-radius: 4px; font-weight: bold; display: inline-block;">{label}</a>
  </div>"#,
        href = escape_html(href),
        label = escape_html(label)
    )
}

fn description_of(task: &Task) -> &str {
    task.description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description")
}

fn task_card(task: &Task, now: DateTime<Utc>) -> String {
    format!(
        r#"  <div style="background-color: #f9f9f9; padding: 15px; border-radius: 4px; margin: 20px 0;">
    <h3 style="color: #333; margin-top: 0;">Task details</h3>
    <p><strong>Title:</strong> {title}</p>
    <p><strong>Description:</strong> {description}</p>
    <p><strong>Due:</strong> {due} ({remaining})</p>
    <p><strong>Priority:</strong> {priority}</p>
  </div>"#,
        title = escape_html(&task.title),
        description = escape_html(description_of(task)),
        due = escape_html(&format_due_date(task.due_date, task.timezone_offset)),
        remaining = days_remaining(task.due_date, task.timezone_offset, now),
        priority = task.priority.label(),
    )
}

fn task_list_html(tasks: &[Task], detail: impl Fn(&Task) -> String) -> String {
    let mut html = String::from("  <ul style=\"padding-left: 20px;\">\n");
    for task in tasks {
        let _ = writeln!(
            html,
            "    <li><strong>{}</strong> &middot; {} &middot; {}</li>",
            escape_html(&task.title),
            escape_html(&format_due_date(task.due_date, task.timezone_offset)),
            escape_html(&detail(task))
        );
    }
    html.push_str("  </ul>");
    html
}

fn task_list_text(tasks: &[Task], detail: impl Fn(&Task) -> String) -> String {
    let mut text = String::new();
    for task in tasks {
        let _ = writeln!(
            text,
            "  - {} | {} | {}",
            task.title,
            format_due_date(task.due_date, task.timezone_offset),
            detail(task)
        );
    }
    text
}

pub fn task_reminder(
    task: &Task,
    subject: Option<&str>,
    intro: Option<&str>,
    frontend_url: &str,
    now: DateTime<Utc>,
) -> Rendered {
    let subject = subject.unwrap_or(DEFAULT_REMINDER_SUBJECT).to_string();
    let intro = match intro {
        Some(intro) => intro.to_string(),
        None => format!("Your task \"{}\" is coming due soon.", task.title),
    };

    let body = format!(
        "  <p style=\"font-size: 16px; color: #555;\">{}</p>\n{}\n{}",
        escape_html(&intro),
        task_card(task, now),
        button(frontend_url, "View my task")
    );

    let text = format!(
        "{intro}\n\nTitle: {title}\nDescription: {description}\nDue: {due} ({remaining})\nPriority: {priority}\n\n{url}\n",
        intro = intro,
        title = task.title,
        description = description_of(task),
        due = format_due_date(task.due_date, task.timezone_offset),
        remaining = days_remaining(task.due_date, task.timezone_offset, now),
        priority = task.priority,
        url = frontend_url,
    );

    Rendered {
        subject,
        text,
        html: layout("Task reminder", &body),
    }
}

pub fn overdue_report(user: &User, report: &OverdueReport, frontend_url: &str) -> Rendered {
    let now = report.generated_at;
    let late_by = |task: &Task| format!("late by {}", describe_elapsed(now - task.due_date));

    let mut body = format!(
        "  <p style=\"font-size: 16px; color: #555;\">Hi {}, you have {} overdue task{}.</p>\n",
        escape_html(&user.name),
        report.total(),
        if report.total() == 1 { "" } else { "s" }
    );
    let mut text = format!("Hi {}, you have {} overdue task(s).\n", user.name, report.total());

    for (tier, tasks) in report.buckets.tiers() {
        let color = match tier {
            OverdueTier::Recent => "#f0ad4e",
            OverdueTier::Moderate => "#e67e22",
            OverdueTier::Severe => "#d9534f",
        };
        let _ = writeln!(
            body,
            "  <h3 style=\"color: {}; margin-bottom: 5px;\">{} ({})</h3>\n{}",
            color,
            tier.heading(),
            tasks.len(),
            task_list_html(tasks, late_by)
        );
        let _ = write!(text, "\n{} ({}):\n{}", tier.heading(), tasks.len(), task_list_text(tasks, late_by));
    }

    body.push_str(&button(frontend_url, "Review my tasks"));
    let _ = write!(text, "\n{}\n", frontend_url);

    Rendered {
        subject: format!("You have {} overdue task(s)", report.total()),
        text,
        html: layout("Overdue tasks", &body),
    }
}

pub fn weekly_digest(user: &User, digest: &WeeklyDigest, frontend_url: &str) -> Rendered {
    let period = format!(
        "{} to {}",
        digest.week.start.format("%b %-d"),
        (digest.week.end - chrono::Duration::days(1)).format("%b %-d, %Y")
    );
    let status = |task: &Task| {
        if task.completed {
            "done".to_string()
        } else if let DueWindow::Overdue(_) = DueWindow::classify(task.due_date, digest.generated_at) {
            "overdue".to_string()
        } else {
            task.priority.to_string()
        }
    };
    let priority = |task: &Task| task.priority.to_string();

    let sections: [(&str, &[Task], &dyn Fn(&Task) -> String); 3] = [
        ("Due this week", digest.week_tasks.as_slice(), &status),
        ("Still overdue from earlier", digest.overdue_tasks.as_slice(), &priority),
        ("Completed this week", digest.completed_tasks.as_slice(), &priority),
    ];

    let mut body = format!(
        "  <p style=\"font-size: 16px; color: #555;\">Hi {}, here is your summary for {}. {} task{} still pending this week.</p>\n",
        escape_html(&user.name),
        escape_html(&period),
        digest.pending_this_week(),
        if digest.pending_this_week() == 1 { " is" } else { "s are" }
    );
    let mut text = format!("Hi {}, here is your summary for {}.\n", user.name, period);

    for (heading, tasks, detail) in sections {
        if tasks.is_empty() {
            continue;
        }
        let _ = writeln!(
            body,
            "  <h3 style=\"color: #333; margin-bottom: 5px;\">{} ({})</h3>\n{}",
            heading,
            tasks.len(),
            task_list_html(tasks, detail)
        );
        let _ = write!(text, "\n{} ({}):\n{}", heading, tasks.len(), task_list_text(tasks, detail));
    }

    body.push_str(&button(frontend_url, "Open my dashboard"));
    let _ = write!(text, "\n{}\n", frontend_url);

    Rendered {
        subject: format!("Your weekly task summary ({})", period),
        text,
        html: layout("Weekly summary", &body),
    }
}

pub fn password_reset(user: &User, reset_url: &str) -> Rendered {
    let link = escape_html(reset_url);
    let body = format!(
        r#"  <p>Hi {name}, you asked to reset your password. Use the button below to choose a new one:</p>
{button}
  <p>If you did not request this change, you can ignore this email.</p>
  <p>The link expires in 1 hour.</p>
  <p>If the button does not work, copy this URL into your browser:<br><a href="{link}">{link}</a></p>"#,
        name = escape_html(&user.name),
        button = button(reset_url, "Reset password"),
        link = link
    );
    let text = format!(
        "Hi {}, you asked to reset your password.\n\nOpen this link to choose a new one (it expires in 1 hour):\n{}\n\nIf you did not request this change, you can ignore this email.\n",
        user.name, reset_url
    );

    Rendered {
        subject: "Password reset".to_string(),
        text,
        html: layout("Password recovery", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use crate::notifications::windows::TimeRange;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: 1,
            name: "Ana <admin>".to_string(),
            email: "ana@example.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn task(title: &str, due: DateTime<Utc>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            due_date: due,
            user_time_zone: "America/Bogota".to_string(),
            timezone_offset: 300,
            priority: TaskPriority::High,
            completed: false,
            user_id: 1,
            created_at: due,
            updated_at: due,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_task_reminder_renders_local_due_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2025, 3, 5, 19, 30, 0).unwrap();
        let rendered = task_reminder(&task("File <taxes>", due), None, None, "https://app.example", now);

        assert_eq!(rendered.subject, DEFAULT_REMINDER_SUBJECT);
        assert!(rendered.html.contains("File &lt;taxes&gt;"));
        assert!(!rendered.html.contains("<taxes>"));
        assert!(rendered.html.contains("Mar 5, 2025 14:30 (UTC-05:00)"));
        assert!(rendered.html.contains("Tomorrow"));
        assert!(rendered.html.contains("No description"));
        assert!(rendered.html.contains("⚠️ High"));
        assert!(rendered.text.contains("Priority: high"));
    }

    #[test]
    fn test_task_reminder_overrides() {
        let now = Utc::now();
        let rendered = task_reminder(
            &task("Standup", now + Duration::hours(3)),
            Some("Due today"),
            Some("This one is due today."),
            "https://app.example",
            now,
        );
        assert_eq!(rendered.subject, "Due today");
        assert!(rendered.text.starts_with("This one is due today."));
    }

    #[test]
    fn test_overdue_report_sections() {
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 10, 0, 0).unwrap();
        let report = OverdueReport::build(
            vec![task("Old", now - Duration::days(6)), task("New", now - Duration::hours(5))],
            now,
        )
        .unwrap();

        let rendered = overdue_report(&user(), &report, "https://app.example");
        assert_eq!(rendered.subject, "You have 2 overdue task(s)");
        assert!(rendered.html.contains("Overdue in the last 24 hours (1)"));
        assert!(rendered.html.contains("Overdue for more than 3 days (1)"));
        assert!(!rendered.html.contains("Overdue for 1 to 3 days"));
        assert!(rendered.html.contains("late by 6 days"));
        assert!(rendered.html.contains("Ana &lt;admin&gt;"));
        assert!(rendered.text.contains("late by 5 hours"));
    }

    #[test]
    fn test_weekly_digest_sections() {
        let monday = Utc.with_ymd_and_hms(2025, 6, 9, 7, 0, 0).unwrap();
        let week = TimeRange::week_of(monday);
        let digest = WeeklyDigest::build(
            week,
            monday,
            vec![task("Report", monday + Duration::days(2))],
            vec![task("Taxes", monday - Duration::days(3))],
            vec![],
        )
        .unwrap();

        let rendered = weekly_digest(&user(), &digest, "https://app.example");
        assert_eq!(rendered.subject, "Your weekly task summary (Jun 9 to Jun 15, 2025)");
        assert!(rendered.html.contains("Due this week (1)"));
        assert!(rendered.html.contains("Still overdue from earlier (1)"));
        assert!(!rendered.html.contains("Completed this week"));
        assert!(rendered.html.contains("1 task is still pending"));
    }

    #[test]
    fn test_weekly_digest_lists_completed_tasks() {
        let monday = Utc.with_ymd_and_hms(2025, 6, 9, 7, 0, 0).unwrap();
        let mut shipped = task("Ship <v2>", monday + Duration::days(1));
        shipped.completed = true;
        let mut filed = task("File taxes", monday - Duration::days(10));
        filed.completed = true;

        let digest = WeeklyDigest::build(
            TimeRange::week_of(monday),
            monday,
            vec![shipped.clone(), task("Report", monday + Duration::days(2))],
            vec![],
            vec![filed, shipped],
        )
        .unwrap();

        let rendered = weekly_digest(&user(), &digest, "https://app.example");
        assert!(rendered.html.contains("Completed this week (2)"));
        assert!(rendered.html.contains("<strong>File taxes</strong>"));
        assert!(rendered.html.contains("<strong>Ship &lt;v2&gt;</strong>"));
        assert!(rendered.html.contains("1 task is still pending"));
        assert!(rendered.text.contains("Completed this week (2):\n  - File taxes |"));
        assert!(!rendered.html.contains("Still overdue from earlier"));
    }

    #[test]
    fn test_password_reset_contains_link() {
        let url = "https://app.example/reset-password?token=abc.def";
        let rendered = password_reset(&user(), url);
        assert_eq!(rendered.html.matches(url).count(), 3);
        assert!(rendered.text.contains(url));
        assert!(rendered.html.contains("expires in 1 hour"));
    }
}
