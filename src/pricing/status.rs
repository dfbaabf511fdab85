//! Sale status state machine over an append-only audit log.
//!
//! A subject (a date, optionally scoped to one choice) is either on sale or
//! closed. Transitions only happen on explicit operator toggles, and every
//! transition appends one immutable `status_click_logs` row; the current
//! state is whatever the most recent entry says.
//!
//! Two deliberate, differing defaults when no entry exists:
//! calendar rendering treats the subject as on sale, while purchasability
//! treats a missing rule row as closed. Both are intentional and must not be
//! unified.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::models::PricingRule;

/// Binary sale state of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Sale,
    Closed,
}

/// Actions recorded in the audit log. Sale toggles and checklist toggles
/// share the same log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Sale,
    Closed,
    Completed,
    Uncompleted,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Sale => "sale",
            StatusAction::Closed => "closed",
            StatusAction::Completed => "completed",
            StatusAction::Uncompleted => "uncompleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sale" => Some(StatusAction::Sale),
            "closed" => Some(StatusAction::Closed),
            "completed" => Some(StatusAction::Completed),
            "uncompleted" => Some(StatusAction::Uncompleted),
            _ => None,
        }
    }
}

/// One immutable audit log row from `status_click_logs`.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct StatusLogEntry {
    pub id: Uuid,
    pub subject_id: String,
    pub actor: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

/// Checklist item from `checklist_items`, subject of the bulk reset.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub category: String,
    pub title: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Build the log subject id for a priced day, optionally scoped to a choice.
pub fn subject_id(
    product_id: Uuid,
    channel_id: Uuid,
    date: NaiveDate,
    choice_id: Option<&str>,
) -> String {
    match choice_id {
        Some(choice) => format!("{product_id}:{channel_id}:{date}:{choice}"),
        None => format!("{product_id}:{channel_id}:{date}"),
    }
}

/// State for calendar display. No entry at all renders as on sale.
pub fn calendar_status(latest: Option<&StatusLogEntry>) -> SaleStatus {
    match latest.map(|e| e.action.as_str()) {
        Some("closed") => SaleStatus::Closed,
        _ => SaleStatus::Sale,
    }
}

/// The state a current-status read reports: calendar state plus
/// purchasability, each from its own default.
pub fn current_state(
    rule: Option<&PricingRule>,
    latest: Option<&StatusLogEntry>,
) -> (SaleStatus, bool) {
    (calendar_status(latest), purchasable(rule, latest))
}

/// Whether the day is currently purchasable. A missing rule row is closed,
/// regardless of what the calendar would show.
pub fn purchasable(rule: Option<&PricingRule>, latest: Option<&StatusLogEntry>) -> bool {
    let Some(rule) = rule else {
        return false;
    };
    if !rule.is_sale_available {
        return false;
    }
    calendar_status(latest) == SaleStatus::Sale
}

/// Append a sale/closed transition for the subject. The log row is the
/// transition; nothing is updated in place.
pub async fn record_transition(
    pool: &PgPool,
    subject_id: &str,
    actor: &str,
    state: SaleStatus,
) -> Result<StatusLogEntry> {
    let action = match state {
        SaleStatus::Sale => StatusAction::Sale,
        SaleStatus::Closed => StatusAction::Closed,
    };
    append_log(pool, subject_id, actor, action).await
}

async fn append_log<'e>(
    exec: impl PgExecutor<'e>,
    subject_id: &str,
    actor: &str,
    action: StatusAction,
) -> Result<StatusLogEntry> {
    let entry = sqlx::query_as::<_, StatusLogEntry>(
        r#"
        INSERT INTO status_click_logs (id, subject_id, actor, action, created_at)
        VALUES ($1, $2, $3, $4, now())
        RETURNING id, subject_id, actor, action, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subject_id)
    .bind(actor)
    .bind(action.as_str())
    .fetch_one(exec)
    .await?;

    Ok(entry)
}

/// Most recent log entry for a subject, if any.
pub async fn latest_entry(pool: &PgPool, subject_id: &str) -> Result<Option<StatusLogEntry>> {
    let entry = sqlx::query_as::<_, StatusLogEntry>(
        r#"
        SELECT id, subject_id, actor, action, created_at
        FROM status_click_logs
        WHERE subject_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

/// Full history for a subject, newest first, for the audit display.
pub async fn history(pool: &PgPool, subject_id: &str) -> Result<Vec<StatusLogEntry>> {
    let entries = sqlx::query_as::<_, StatusLogEntry>(
        r#"
        SELECT id, subject_id, actor, action, created_at
        FROM status_click_logs
        WHERE subject_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Flip every completed item of a checklist category back to uncompleted,
/// appending one log entry per affected item. Returns how many items were
/// reset.
pub async fn reset_category(pool: &PgPool, category: &str, actor: &str) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let items = sqlx::query_as::<_, ChecklistItem>(
        r#"
        SELECT id, category, title, completed, updated_at
        FROM checklist_items
        WHERE category = $1 AND completed = true
        "#,
    )
    .bind(category)
    .fetch_all(&mut *tx)
    .await?;

    for item in &items {
        sqlx::query(
            "UPDATE checklist_items SET completed = false, updated_at = now() WHERE id = $1",
        )
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

        append_log(&mut *tx, &item.id.to_string(), actor, StatusAction::Uncompleted).await?;
    }

    tx.commit().await.map_err(AppError::from)?;

    tracing::info!(category, reset = items.len(), "checklist category reset");
    Ok(items.len())
}
