//! Scoped edits and deletes of recurring series.
//!
//! [`SeriesManager`] applies a change to one occurrence (`single`), to an
//! occurrence and everything after it (`future`) or to the whole series
//! (`all`). Relational steps run first and abort the operation on failure.
//! Calendar provider calls run afterwards; a failed call is logged, recorded
//! in the returned [`SeriesChangeSummary`] and leaves the affected link marked
//! [`SyncStatus::Failed`] so it can be found later with
//! [`CalendarEventStore::find_failed_events`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::calendar::{
    CalendarError, CalendarProvider, DeleteEventRequest, ScheduleEventRequest, UpdateEventRequest,
};
use crate::error::CoreError;
use crate::models::{
    DeleteRequest, EditRequest, ExceptionType, InstanceStatus,
    RecurringTaskInstance, SeriesChangeSummary, SyncFailure, SyncStatus, SyncStep, Task,
    validate_duration, TaskCalendarEvent, TaskUpdates, UpdateScope, UserCalendarPreferences,
};
use crate::recurrence::{self, RecurrenceConfig, RuleBuilder};
use crate::repository::{Repository, SeriesTail};
use crate::timezone;

/// Most occurrences examined when listing a series.
const OCCURRENCE_SCAN_LIMIT: u16 = u16::MAX;

/// One occurrence of a series with its materialized state applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub title: String,
    pub status: InstanceStatus,
    /// Whether a per-occurrence record exists for this date
    pub is_exception: bool,
}

/// A recurring task with the owner's preferences resolved.
struct SeriesContext {
    task: Task,
    prefs: UserCalendarPreferences,
    tz: Tz,
}

impl SeriesContext {
    fn recurrence(&self) -> Result<RecurrenceConfig, CoreError> {
        RecurrenceConfig::for_task(&self.task, self.tz)
    }

    fn end_of(&self, start: DateTime<Utc>, duration: Option<i64>) -> DateTime<Utc> {
        let minutes = duration
            .filter(|m| *m > 0)
            .unwrap_or_else(|| self.prefs.duration_for(&self.task));
        timezone::end_after(start, minutes)
    }
}

pub struct SeriesManager<'a, S, C, R> {
    store: &'a S,
    calendar: &'a C,
    rules: &'a R,
}

impl<'a, S, C, R> SeriesManager<'a, S, C, R>
where
    S: Repository,
    C: CalendarProvider,
    R: RuleBuilder,
{
    pub fn new(store: &'a S, calendar: &'a C, rules: &'a R) -> Self {
        Self {
            store,
            calendar,
            rules,
        }
    }

    /// Applies `request.updates` with the requested scope.
    #[instrument(skip(self, request), fields(task_id = %request.task_id, scope = %request.scope))]
    pub async fn edit(&self, request: EditRequest) -> Result<SeriesChangeSummary, CoreError> {
        validate_updates(&request.updates)?;
        let ctx = self.load_series(request.task_id).await?;

        let summary = match request.scope {
            UpdateScope::Single => {
                if request.updates.is_empty() {
                    return Err(CoreError::InvalidInput("No changes requested".to_string()));
                }
                let date = require_date(request.instance_date, request.scope)?;
                self.edit_single(&ctx, date, &request.updates).await?
            }
            UpdateScope::Future => {
                if request.updates.is_empty() {
                    return Err(CoreError::InvalidInput("No changes requested".to_string()));
                }
                let date = require_date(request.instance_date, request.scope)?;
                self.edit_future(&ctx, date, &request.updates).await?
            }
            UpdateScope::All => {
                if request.updates.is_empty() && !request.reset_exceptions {
                    return Err(CoreError::InvalidInput("No changes requested".to_string()));
                }
                self.edit_all(&ctx, &request.updates, request.reset_exceptions)
                    .await?
            }
        };

        info!(
            affected = summary.affected,
            new_task_id = ?summary.new_task_id,
            sync_failures = summary.sync_failures.len(),
            "series edit applied"
        );
        Ok(summary)
    }

    /// Removes one occurrence, an occurrence and its successors, or the series.
    #[instrument(skip(self, request), fields(task_id = %request.task_id, scope = %request.scope))]
    pub async fn delete(&self, request: DeleteRequest) -> Result<SeriesChangeSummary, CoreError> {
        let ctx = self.load_series(request.task_id).await?;

        let summary = match request.scope {
            UpdateScope::Single => {
                let date = require_date(request.instance_date, request.scope)?;
                self.delete_single(&ctx, date).await?
            }
            UpdateScope::Future => {
                let date = require_date(request.instance_date, request.scope)?;
                self.delete_future(&ctx, date).await?
            }
            UpdateScope::All => self.delete_all(&ctx).await?,
        };

        info!(
            affected = summary.affected,
            sync_failures = summary.sync_failures.len(),
            "series delete applied"
        );
        Ok(summary)
    }

    /// Creates the provider master event for a series that has none yet.
    ///
    /// Returns the existing master link when the series is already published.
    #[instrument(skip(self))]
    pub async fn publish(&self, task_id: Uuid) -> Result<TaskCalendarEvent, CoreError> {
        let ctx = self.load_series(task_id).await?;
        if let Some(master) = self.store.find_master_event(task_id).await? {
            debug!(event_id = %master.calendar_event_id, "series already published");
            return Ok(master);
        }
        self.schedule_master(&ctx.task, &ctx.prefs).await
    }

    /// Occurrences on or after `from`, at most `limit`, with exceptions applied.
    pub async fn occurrences(
        &self,
        task_id: Uuid,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let ctx = self.load_series(task_id).await?;
        let config = ctx.recurrence()?;

        let mut materialized: HashMap<NaiveDate, RecurringTaskInstance> = self
            .store
            .find_instances(task_id)
            .await?
            .into_iter()
            .map(|instance| (instance.instance_date, instance))
            .collect();

        let occurrences = self
            .rules
            .calculate_instances(&config, OCCURRENCE_SCAN_LIMIT)?
            .into_iter()
            .map(|start| (timezone::local_date(start, &ctx.tz), start))
            .filter(|(date, _)| *date >= from)
            .take(limit)
            .map(|(date, start)| {
                let instance = materialized.remove(&date);
                let overrides = instance
                    .as_ref()
                    .and_then(|i| i.override_data.clone())
                    .unwrap_or_default();
                Occurrence {
                    date,
                    start: overrides.start_instant.unwrap_or(start),
                    duration_minutes: overrides
                        .duration_minutes
                        .unwrap_or_else(|| ctx.prefs.duration_for(&ctx.task)),
                    title: overrides.title.unwrap_or_else(|| ctx.task.title.clone()),
                    status: instance
                        .as_ref()
                        .map_or(InstanceStatus::Scheduled, |i| i.status),
                    is_exception: instance.is_some(),
                }
            })
            .collect();
        Ok(occurrences)
    }

    // ------------------------------------------------------------------
    // edit scopes
    // ------------------------------------------------------------------

    async fn edit_single(
        &self,
        ctx: &SeriesContext,
        date: NaiveDate,
        updates: &TaskUpdates,
    ) -> Result<SeriesChangeSummary, CoreError> {
        if updates.recurrence_pattern.is_some() {
            return Err(CoreError::InvalidInput(
                "A single occurrence cannot change the recurrence pattern".to_string(),
            ));
        }
        let occurrence_start = self.require_occurrence(ctx, date)?;
        let mut summary = SeriesChangeSummary::new(UpdateScope::Single);

        let instance = RecurringTaskInstance {
            override_data: Some(updates.as_override()),
            ..RecurringTaskInstance::new(ctx.task.id, date, InstanceStatus::Scheduled)
        };
        let saved = self
            .store
            .upsert_instance(&instance)
            .await
            .map_err(CoreError::at_step("upsert instance"))?;
        summary.affected += 1;

        let overrides = saved.override_data.unwrap_or_default();
        let start = overrides.start_instant.unwrap_or(occurrence_start);
        let end = ctx.end_of(start, overrides.duration_minutes);

        let Some(link) = self
            .occurrence_link(ctx, date, ExceptionType::Modified, start, end)
            .await?
        else {
            debug!(%date, "series not published, provider untouched");
            return Ok(summary);
        };

        let request = UpdateEventRequest {
            event_id: master_event_id(&link),
            calendar_id: link.calendar_id.clone(),
            update_scope: Some(UpdateScope::Single),
            instance_date: Some(date),
            summary: overrides.title,
            start_time: Some(start),
            end_time: Some(end),
            ..Default::default()
        };
        if let Err(e) = self.calendar.update_event(ctx.task.user_id, request).await {
            self.record_failure(&mut summary, Some(&link), SyncStep::UpdateEvent, e)
                .await?;
        }
        Ok(summary)
    }

    async fn edit_future(
        &self,
        ctx: &SeriesContext,
        date: NaiveDate,
        updates: &TaskUpdates,
    ) -> Result<SeriesChangeSummary, CoreError> {
        let occurrence_start = self.require_occurrence(ctx, date)?;
        self.reject_first_occurrence(ctx, date)?;
        // The new head may change the time of day, not the date
        if let Some(start) = updates.start_instant {
            let day = timezone::local_date(start, &ctx.tz);
            if day != date {
                return Err(CoreError::InvalidInput(format!(
                    "New series start {} falls on {}, not on the split date {}",
                    start, day, date
                )));
            }
        }
        let mut summary = SeriesChangeSummary::new(UpdateScope::Future);

        let truncated = truncated_before(&ctx.task, date)?;
        summary.affected += 1 + self
            .store
            .truncate_series(&truncated, date, SeriesTail::Drop)
            .await
            .map_err(CoreError::at_step("truncate original series"))?;

        let now = Utc::now();
        let mut head = Task {
            id: Uuid::now_v7(),
            start_instant: Some(occurrence_start),
            created_at: now,
            updated_at: now,
            ..ctx.task.clone()
        };
        updates.apply_to(&mut head);
        self.store
            .insert_task(&head)
            .await
            .map_err(CoreError::at_step("create new series"))?;
        summary.affected += 1;
        summary.new_task_id = Some(head.id);

        self.push_series_rule(ctx, &truncated, UpdateScope::Future, None, &mut summary)
            .await?;

        match self.schedule_master(&head, &ctx.prefs).await {
            Ok(_) => {}
            Err(CoreError::Calendar(e)) => {
                self.record_failure(&mut summary, None, SyncStep::ScheduleEvent, e)
                    .await?
            }
            Err(e) => return Err(e),
        }
        Ok(summary)
    }

    async fn edit_all(
        &self,
        ctx: &SeriesContext,
        updates: &TaskUpdates,
        reset_exceptions: bool,
    ) -> Result<SeriesChangeSummary, CoreError> {
        let mut summary = SeriesChangeSummary::new(UpdateScope::All);
        let mut updated = ctx.task.clone();

        if !updates.is_empty() {
            updates.apply_to(&mut updated);
            self.store
                .update_task(&updated)
                .await
                .map_err(CoreError::at_step("update series"))?;
            summary.affected += 1;
        }

        if reset_exceptions {
            summary.affected += self
                .store
                .reset_exceptions(updated.id)
                .await
                .map_err(CoreError::at_step("reset exceptions"))?;
        }

        if !updates.is_empty() {
            self.push_series_rule(ctx, &updated, UpdateScope::All, updates.title.clone(), &mut summary)
                .await?;
        }
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // delete scopes
    // ------------------------------------------------------------------

    async fn delete_single(&self, ctx: &SeriesContext, date: NaiveDate) -> Result<SeriesChangeSummary, CoreError> {
        let occurrence_start = self.require_occurrence(ctx, date)?;
        let mut summary = SeriesChangeSummary::new(UpdateScope::Single);

        self.store
            .upsert_instance(&RecurringTaskInstance::new(
                ctx.task.id,
                date,
                InstanceStatus::Cancelled,
            ))
            .await
            .map_err(CoreError::at_step("cancel instance"))?;
        summary.affected += 1;

        let end = ctx.end_of(occurrence_start, None);
        let Some(link) = self
            .occurrence_link(ctx, date, ExceptionType::Cancelled, occurrence_start, end)
            .await?
        else {
            debug!(%date, "series not published, provider untouched");
            return Ok(summary);
        };

        let request = UpdateEventRequest {
            event_id: master_event_id(&link),
            calendar_id: link.calendar_id.clone(),
            update_scope: Some(UpdateScope::Single),
            instance_date: Some(date),
            cancelled: true,
            ..Default::default()
        };
        if let Err(e) = self.calendar.update_event(ctx.task.user_id, request).await {
            self.record_failure(&mut summary, Some(&link), SyncStep::UpdateEvent, e)
                .await?;
        }
        Ok(summary)
    }

    async fn delete_future(&self, ctx: &SeriesContext, date: NaiveDate) -> Result<SeriesChangeSummary, CoreError> {
        self.require_occurrence(ctx, date)?;
        self.reject_first_occurrence(ctx, date)?;
        let mut summary = SeriesChangeSummary::new(UpdateScope::Future);

        let truncated = truncated_before(&ctx.task, date)?;
        summary.affected += 1 + self
            .store
            .truncate_series(&truncated, date, SeriesTail::Cancel)
            .await
            .map_err(CoreError::at_step("truncate series"))?;

        self.push_series_rule(ctx, &truncated, UpdateScope::Future, None, &mut summary)
            .await?;
        Ok(summary)
    }

    async fn delete_all(&self, ctx: &SeriesContext) -> Result<SeriesChangeSummary, CoreError> {
        let mut summary = SeriesChangeSummary::new(UpdateScope::All);
        let links = self.store.find_calendar_events(ctx.task.id).await?;

        // Exceptions live on the master event and go with it
        for link in links.iter().filter(|l| l.is_master_event || l.recurrence_master_id.is_none()) {
            let request = DeleteEventRequest {
                event_id: link.calendar_event_id.clone(),
                calendar_id: link.calendar_id.clone(),
            };
            if let Err(e) = self.calendar.delete_event(ctx.task.user_id, request).await {
                // The link is removed below, so the summary is the only record
                self.record_failure(&mut summary, None, SyncStep::DeleteEvent, e)
                    .await?;
                if let Some(failure) = summary.sync_failures.last_mut() {
                    failure.event_id = Some(link.calendar_event_id.clone());
                }
            }
        }

        summary.affected += 1 + self
            .store
            .delete_series(ctx.task.id)
            .await
            .map_err(CoreError::at_step("delete series"))?;
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    async fn load_series(&self, task_id: Uuid) -> Result<SeriesContext, CoreError> {
        let task = self
            .store
            .find_task_by_id(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(task_id.to_string()))?;

        if !task.is_recurring() {
            return Err(CoreError::InvalidInput(format!(
                "Task {} is not a recurring series",
                task_id
            )));
        }

        let prefs = self.store.get_preferences(task.user_id).await?;
        let tz = timezone::parse_timezone(&prefs.timezone)?;
        Ok(SeriesContext { task, prefs, tz })
    }

    fn require_occurrence(&self, ctx: &SeriesContext, date: NaiveDate) -> Result<DateTime<Utc>, CoreError> {
        recurrence::occurrence_on(self.rules, &ctx.recurrence()?, date)?.ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "{} is not an occurrence of series {}",
                date, ctx.task.id
            ))
        })
    }

    fn reject_first_occurrence(&self, ctx: &SeriesContext, date: NaiveDate) -> Result<(), CoreError> {
        let first = recurrence::occurrence_dates(self.rules, &ctx.recurrence()?, 1)?;
        if first.first() == Some(&date) {
            return Err(CoreError::InvalidInput(format!(
                "{} is the first occurrence of series {}; use scope 'all'",
                date, ctx.task.id
            )));
        }
        Ok(())
    }

    /// The link for the occurrence on `date`, flagged as an exception of
    /// `kind`. Created from the master when missing; `None` when the series
    /// has no provider event at all.
    async fn occurrence_link(
        &self,
        ctx: &SeriesContext,
        date: NaiveDate,
        kind: ExceptionType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<TaskCalendarEvent>, CoreError> {
        let existing = self.store.find_occurrence_event(ctx.task.id, date).await?;
        let mut link = match existing {
            Some(link) => link,
            None => match self.store.find_master_event(ctx.task.id).await? {
                Some(master) => TaskCalendarEvent::exception_of(&master, date, kind, start, end),
                None => return Ok(None),
            },
        };

        link.is_exception = true;
        link.exception_type = Some(kind);
        link.series_update_scope = Some(UpdateScope::Single);
        link.event_start = start;
        link.event_end = end;
        link.sync_status = match kind {
            ExceptionType::Modified => SyncStatus::Synced,
            ExceptionType::Cancelled => SyncStatus::Deleted,
        };

        self.store
            .save_calendar_event(&link)
            .await
            .map_err(CoreError::at_step("save occurrence link"))?;
        Ok(Some(link))
    }

    /// Sends the rebuilt rule of `task` to its master event.
    async fn push_series_rule(
        &self,
        ctx: &SeriesContext,
        task: &Task,
        scope: UpdateScope,
        title: Option<String>,
        summary: &mut SeriesChangeSummary,
    ) -> Result<(), CoreError> {
        let Some(mut master) = self.store.find_master_event(ctx.task.id).await? else {
            debug!("series not published, provider untouched");
            return Ok(());
        };
        let Some(pattern) = task.recurrence_pattern else {
            return Ok(());
        };

        let start = task.start_instant.unwrap_or(master.event_start);
        let end = timezone::end_after(start, ctx.prefs.duration_for(task));
        let request = UpdateEventRequest {
            event_id: master.calendar_event_id.clone(),
            calendar_id: master.calendar_id.clone(),
            update_scope: Some(scope),
            summary: title,
            start_time: Some(start),
            end_time: Some(end),
            recurrence_rule: Some(self.rules.build_rule(pattern, task.recurrence_ends)),
            ..Default::default()
        };

        match self.calendar.update_event(task.user_id, request).await {
            Ok(()) => {
                master.event_start = start;
                master.event_end = end;
                master.series_update_scope = Some(scope);
                master.sync_status = SyncStatus::Synced;
                self.store
                    .save_calendar_event(&master)
                    .await
                    .map_err(CoreError::at_step("save master link"))?;
            }
            Err(e) => {
                self.record_failure(summary, Some(&master), SyncStep::UpdateEvent, e)
                    .await?
            }
        }
        Ok(())
    }

    /// Creates the provider event carrying the rule of `task` and links it.
    async fn schedule_master(
        &self,
        task: &Task,
        prefs: &UserCalendarPreferences,
    ) -> Result<TaskCalendarEvent, CoreError> {
        let pattern = task.recurrence_pattern.ok_or_else(|| {
            CoreError::InvalidInput(format!("Task {} is not a recurring series", task.id))
        })?;
        let start = task.start_instant.ok_or_else(|| {
            CoreError::InvalidInput(format!("Recurring task {} has no anchor time", task.id))
        })?;
        let minutes = prefs.duration_for(task);

        let event = self
            .calendar
            .schedule_task(
                task.user_id,
                ScheduleEventRequest {
                    task_id: task.id,
                    summary: task.title.clone(),
                    start_time: start,
                    duration_minutes: minutes,
                    calendar_id: None,
                    recurrence_rule: Some(self.rules.build_rule(pattern, task.recurrence_ends)),
                },
            )
            .await?;

        let link = TaskCalendarEvent::master(
            task,
            event.event_id,
            event.calendar_id,
            start,
            timezone::end_after(start, minutes),
        );
        self.store
            .save_calendar_event(&link)
            .await
            .map_err(CoreError::at_step("save master link"))?;

        debug!(task_id = %task.id, event_id = %link.calendar_event_id, "series published");
        Ok(link)
    }

    async fn record_failure(
        &self,
        summary: &mut SeriesChangeSummary,
        link: Option<&TaskCalendarEvent>,
        step: SyncStep,
        err: CalendarError,
    ) -> Result<(), CoreError> {
        let event_id = link.map(|l| l.calendar_event_id.clone());
        error!(
            %step,
            event_id = event_id.as_deref().unwrap_or("-"),
            error = %err,
            "calendar provider call failed; relational changes kept"
        );

        if let Some(link) = link {
            self.store
                .set_sync_status(link.id, SyncStatus::Failed)
                .await
                .map_err(CoreError::at_step("mark link failed"))?;
        }

        summary.sync_failures.push(SyncFailure {
            step,
            event_id,
            message: err.to_string(),
        });
        Ok(())
    }
}

fn require_date(date: Option<NaiveDate>, scope: UpdateScope) -> Result<NaiveDate, CoreError> {
    date.ok_or_else(|| CoreError::InvalidInput(format!("Scope '{}' needs an occurrence date", scope)))
}

fn validate_updates(updates: &TaskUpdates) -> Result<(), CoreError> {
    if updates.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(CoreError::InvalidInput("Title cannot be empty".to_string()));
    }
    if let Some(minutes) = updates.duration_minutes {
        validate_duration(minutes)?;
    }
    Ok(())
}

/// Copy of `task` whose last occurrence falls before `date`.
fn truncated_before(task: &Task, date: NaiveDate) -> Result<Task, CoreError> {
    let last = date
        .pred_opt()
        .ok_or_else(|| CoreError::InvalidInput(format!("Date {} is out of range", date)))?;
    Ok(Task {
        recurrence_ends: Some(last),
        updated_at: Utc::now(),
        ..task.clone()
    })
}

/// Provider id of the series an occurrence link belongs to.
fn master_event_id(link: &TaskCalendarEvent) -> String {
    link.recurrence_master_id
        .clone()
        .unwrap_or_else(|| link.calendar_event_id.clone())
}
