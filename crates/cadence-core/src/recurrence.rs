use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rrule::{RRuleSet, Tz as RRuleTz};

use crate::error::CoreError;
use crate::models::{RecurrencePattern, Task};
use crate::timezone;

/// Everything needed to expand a series into concrete occurrences.
#[derive(Debug, Clone)]
pub struct RecurrenceConfig {
    pub pattern: RecurrencePattern,
    /// First occurrence (the series anchor)
    pub start: DateTime<Utc>,
    /// Zone the rule is evaluated in; keeps wall-clock time stable across DST
    pub timezone: Tz,
    /// Last local date an occurrence may fall on
    pub until: Option<NaiveDate>,
}

impl RecurrenceConfig {
    /// Builds the expansion config for a recurring task in the owner's zone.
    pub fn for_task(task: &Task, tz: Tz) -> Result<Self, CoreError> {
        let pattern = task.recurrence_pattern.ok_or_else(|| {
            CoreError::InvalidInput(format!("Task {} is not recurring", task.id))
        })?;
        let start = task.start_instant.ok_or_else(|| {
            CoreError::InvalidInput(format!("Recurring task {} has no anchor time", task.id))
        })?;
        Ok(Self {
            pattern,
            start,
            timezone: tz,
            until: task.recurrence_ends,
        })
    }
}

/// Builds provider rule strings and expands series into occurrences.
pub trait RuleBuilder: Send + Sync {
    /// RFC 5545 `RRULE` value for `pattern`, bounded by `until` when given.
    fn build_rule(&self, pattern: RecurrencePattern, until: Option<NaiveDate>) -> String;

    /// The first `limit` occurrences of the series, cut at `config.until`.
    fn calculate_instances(
        &self,
        config: &RecurrenceConfig,
        limit: u16,
    ) -> Result<Vec<DateTime<Utc>>, CoreError>;
}

/// `RuleBuilder` backed by the `rrule` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RRuleBuilder;

impl RRuleBuilder {
    pub fn new() -> Self {
        Self
    }

    fn frequency(pattern: RecurrencePattern) -> &'static str {
        match pattern {
            RecurrencePattern::Daily => "FREQ=DAILY",
            RecurrencePattern::Weekdays => "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR",
            RecurrencePattern::Weekly => "FREQ=WEEKLY",
            RecurrencePattern::Biweekly => "FREQ=WEEKLY;INTERVAL=2",
            RecurrencePattern::Monthly => "FREQ=MONTHLY",
            RecurrencePattern::Quarterly => "FREQ=MONTHLY;INTERVAL=3",
            RecurrencePattern::Yearly => "FREQ=YEARLY",
        }
    }

    /// `DTSTART` line in the series zone followed by the unbounded rule.
    fn rule_set_source(config: &RecurrenceConfig) -> String {
        let rule = Self::frequency(config.pattern);
        if config.timezone == chrono_tz::UTC {
            format!(
                "DTSTART:{}\nRRULE:{}",
                config.start.format("%Y%m%dT%H%M%SZ"),
                rule
            )
        } else {
            let local_start = config.start.with_timezone(&config.timezone);
            format!(
                "DTSTART;TZID={}:{}\nRRULE:{}",
                config.timezone.name(),
                local_start.format("%Y%m%dT%H%M%S"),
                rule
            )
        }
    }
}

impl RuleBuilder for RRuleBuilder {
    fn build_rule(&self, pattern: RecurrencePattern, until: Option<NaiveDate>) -> String {
        let rule = Self::frequency(pattern);
        match until {
            Some(date) => format!("{};UNTIL={}T235959Z", rule, date.format("%Y%m%d")),
            None => rule.to_string(),
        }
    }

    fn calculate_instances(
        &self,
        config: &RecurrenceConfig,
        limit: u16,
    ) -> Result<Vec<DateTime<Utc>>, CoreError> {
        let source = Self::rule_set_source(config);
        let mut rule_set = source
            .parse::<RRuleSet>()
            .map_err(|e| CoreError::InvalidRRule(format!("Failed to parse '{}': {}", source, e)))?;

        // UNTIL is applied on local dates so the cut matches `recurrence_ends`
        // whatever the zone's UTC offset; `before` only bounds the expansion.
        if let Some(next_day) = config.until.and_then(|until| until.succ_opt()) {
            let bound = timezone::local_to_utc(next_day, NaiveTime::MIN, &config.timezone)?;
            rule_set = rule_set.before(bound.with_timezone(&RRuleTz::UTC));
        }

        let (dates, _) = rule_set.all(limit);
        let instances = dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .take_while(|instant| match config.until {
                Some(until) => timezone::local_date(*instant, &config.timezone) <= until,
                None => true,
            })
            .collect();
        Ok(instances)
    }
}

/// Upper bound on expansion when checking membership; covers a daily series for decades.
const MEMBERSHIP_SCAN_LIMIT: u16 = u16::MAX;

/// Local occurrence dates of a series, at most `limit` of them.
pub fn occurrence_dates(
    rules: &dyn RuleBuilder,
    config: &RecurrenceConfig,
    limit: u16,
) -> Result<Vec<NaiveDate>, CoreError> {
    Ok(rules
        .calculate_instances(config, limit)?
        .into_iter()
        .map(|instant| timezone::local_date(instant, &config.timezone))
        .collect())
}

/// Finds the occurrence falling on local `date`, if the series produces one.
pub fn occurrence_on(
    rules: &dyn RuleBuilder,
    config: &RecurrenceConfig,
    date: NaiveDate,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    if timezone::local_date(config.start, &config.timezone) > date {
        return Ok(None);
    }
    let mut bounded = config.clone();
    bounded.until = Some(config.until.map_or(date, |until| until.min(date)));

    let instances = rules.calculate_instances(&bounded, MEMBERSHIP_SCAN_LIMIT)?;
    Ok(instances
        .into_iter()
        .rev()
        .find(|instant| timezone::local_date(*instant, &config.timezone) == date))
}
