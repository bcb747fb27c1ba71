//! Task state machine.
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──▶ IN_PROGRESS ──▶ COMPLETED
//!    │                   │              │
//!    └───────────────────┴──────────────┴──────▶ CANCELLED
//! ```
//!
//! A provider may also reject a PENDING, unassigned task, which deletes it
//! outright instead of cancelling it. The functions here only decide; the
//! conditional writes live in the task store.

use mongodb::bson::oid::ObjectId;
use serde_json::Value;

use crate::error::{MarketError, MarketResult};
use crate::models::{Actor, Task, TaskStatus, TaskUpdate};

const UPDATABLE_FIELDS: [&str; 2] = ["status", "provider"];

pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;

    matches!(
        (from, to),
        (Pending, Accepted)
            | (Accepted, InProgress)
            | (InProgress, Completed)
            | (Pending | Accepted | InProgress, Cancelled)
    )
}

/// An allowed status change and its side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub rejected_by_provider: bool,
    /// Provider whose completed-task count goes up.
    pub completes_for: Option<ObjectId>,
}

/// Parses a task update body. Only `status` and `provider` may appear.
pub fn parse_update(body: &Value) -> MarketResult<TaskUpdate> {
    let fields = body
        .as_object()
        .ok_or_else(|| MarketError::validation("Update body must be a JSON object"))?;

    if fields.is_empty() {
        return Err(MarketError::validation("No updates provided"));
    }

    if !fields.keys().all(|key| UPDATABLE_FIELDS.contains(&key.as_str())) {
        return Err(MarketError::validation("Invalid updates!"));
    }

    let mut update = TaskUpdate::default();

    if let Some(status) = fields.get("status") {
        let status = status
            .as_str()
            .and_then(TaskStatus::parse)
            .ok_or_else(|| MarketError::validation("Invalid status"))?;
        update.status = Some(status);
    }

    if let Some(provider) = fields.get("provider") {
        let provider = match provider {
            Value::Null => None,
            Value::String(raw) => Some(
                ObjectId::parse_str(raw).map_err(|_| MarketError::validation("Invalid provider ID"))?,
            ),
            _ => return Err(MarketError::validation("Invalid provider ID")),
        };
        update.provider = Some(provider);
    }

    Ok(update)
}

/// Hides tasks the actor has no part in behind a not-found.
pub fn ensure_party(task: &Task, actor: Actor) -> MarketResult<()> {
    if task.is_party(actor.id()) {
        Ok(())
    } else {
        Err(MarketError::not_found("Task not found"))
    }
}

/// The `provider` key may only restate the current assignment. Assignment
/// itself goes through accept so that it stays a conditional write.
pub fn check_provider_field(task: &Task, provider: Option<ObjectId>) -> MarketResult<()> {
    if task.provider == provider {
        Ok(())
    } else {
        Err(MarketError::validation(
            "A provider can only be assigned by accepting the task",
        ))
    }
}

pub fn plan_status_change(task: &Task, actor: Actor, to: TaskStatus) -> MarketResult<Transition> {
    ensure_party(task, actor)?;

    let from = task.status;

    if from.is_terminal() {
        return Err(MarketError::validation(format!("Task is already {}", from.as_str())));
    }

    if from == to {
        return Err(MarketError::validation(format!("Task is already {}", to.as_str())));
    }

    if to == TaskStatus::Accepted {
        return Err(MarketError::validation(
            "Tasks are accepted by a provider through the accept action",
        ));
    }

    if !can_transition(from, to) {
        return Err(MarketError::validation(format!(
            "Cannot move a task from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }

    let cancelled_by_provider = matches!(actor, Actor::Provider(id) if task.provider == Some(id));

    Ok(Transition {
        from,
        to,
        rejected_by_provider: task.rejected_by_provider
            || (to == TaskStatus::Cancelled && cancelled_by_provider),
        completes_for: if to == TaskStatus::Completed { task.provider } else { None },
    })
}
