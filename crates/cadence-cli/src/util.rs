use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::Task;
use cadence_core::repository::TaskStore;
use uuid::Uuid;

/// Resolves a full id or an id prefix (at least two characters) among the user's tasks.
pub async fn resolve_task(repo: &impl TaskStore, user_id: Uuid, short_id: &str) -> Result<Task> {
    if let Ok(id) = short_id.parse::<Uuid>() {
        return repo
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| anyhow!(CoreError::NotFound(format!("No task with ID '{}'", id))));
    }

    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }

    let prefix = short_id.to_lowercase();
    let mut tasks: Vec<Task> = repo
        .find_tasks_for_user(user_id)
        .await?
        .into_iter()
        .filter(|t| t.id.to_string().starts_with(&prefix) || t.id.simple().to_string().starts_with(&prefix))
        .collect();

    match tasks.len() {
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        )))),
        1 => Ok(tasks.remove(0)),
        _ => {
            let candidates: Vec<String> = tasks
                .iter()
                .map(|t| format!("{} ({})", t.id, t.title))
                .collect();
            Err(anyhow!(CoreError::InvalidInput(format!(
                "Ambiguous ID '{}', did you mean one of: {}",
                short_id,
                candidates.join(", ")
            ))))
        }
    }
}
