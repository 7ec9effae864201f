/// Shared types used across the codebase

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Write operations tracked by the observer pipeline and the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// User roles, ordered by privilege. `Master` spans all practices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Manager,
    Admin,
    Master,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Master => "master",
        }
    }

    pub fn at_least(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "master" => Ok(Role::Master),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Red/Amber/Green health indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Red,
    Amber,
    Green,
}

impl RagStatus {
    /// Worst of two statuses (red beats amber beats green)
    pub fn worst(self, other: RagStatus) -> RagStatus {
        use RagStatus::*;
        match (self, other) {
            (Red, _) | (_, Red) => Red,
            (Amber, _) | (_, Amber) => Amber,
            _ => Green,
        }
    }
}

/// How often a task recurs once completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFrequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl TaskFrequency {
    pub const ALL: &'static [&'static str] =
        &["once", "daily", "weekly", "monthly", "quarterly", "annually"];

    /// Next due date after `from`, or None for one-off tasks.
    /// Month arithmetic clamps to the last day of shorter months.
    pub fn next_due_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            TaskFrequency::Once => None,
            TaskFrequency::Daily => from.checked_add_days(Days::new(1)),
            TaskFrequency::Weekly => from.checked_add_days(Days::new(7)),
            TaskFrequency::Monthly => from.checked_add_months(Months::new(1)),
            TaskFrequency::Quarterly => from.checked_add_months(Months::new(3)),
            TaskFrequency::Annually => from.checked_add_months(Months::new(12)),
        }
    }
}

impl FromStr for TaskFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(TaskFrequency::Once),
            "daily" => Ok(TaskFrequency::Daily),
            "weekly" => Ok(TaskFrequency::Weekly),
            "monthly" => Ok(TaskFrequency::Monthly),
            "quarterly" => Ok(TaskFrequency::Quarterly),
            "annually" => Ok(TaskFrequency::Annually),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

/// Whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// True when the date falls on Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() >= 6
}

/// Advance by `days` Monday-to-Friday days. Bank holidays are not modelled.
/// None past the end of the calendar.
pub fn add_working_days(from: NaiveDate, days: u32) -> Option<NaiveDate> {
    let mut date = from;
    let mut remaining = days;
    while remaining > 0 {
        date = date.succ_opt()?;
        if !is_weekend(date) {
            remaining -= 1;
        }
    }
    Some(date)
}

/// First day of the `days`-long inclusive window ending at `end`
pub fn window_start(end: NaiveDate, days: i64) -> Option<NaiveDate> {
    end.checked_sub_days(Days::new(days.max(1) as u64 - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Admin.at_least(Role::Manager));
        assert!(Role::Master.at_least(Role::Admin));
        assert!(!Role::Staff.at_least(Role::Manager));
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn rag_worst_prefers_red() {
        assert_eq!(RagStatus::Green.worst(RagStatus::Amber), RagStatus::Amber);
        assert_eq!(RagStatus::Amber.worst(RagStatus::Red), RagStatus::Red);
        assert_eq!(RagStatus::Green.worst(RagStatus::Green), RagStatus::Green);
    }

    #[test]
    fn monthly_recurrence_clamps_to_month_end() {
        assert_eq!(TaskFrequency::Monthly.next_due_date(date(2024, 1, 31)), Some(date(2024, 2, 29)));
        assert_eq!(TaskFrequency::Quarterly.next_due_date(date(2024, 11, 30)), Some(date(2025, 2, 28)));
        assert_eq!(TaskFrequency::Annually.next_due_date(date(2024, 2, 29)), Some(date(2025, 2, 28)));
    }

    #[test]
    fn one_off_tasks_do_not_recur() {
        assert_eq!(TaskFrequency::Once.next_due_date(date(2024, 5, 1)), None);
        assert_eq!(TaskFrequency::Weekly.next_due_date(date(2024, 5, 1)), Some(date(2024, 5, 8)));
    }

    #[test]
    fn weekend_detection() {
        assert!(is_weekend(date(2024, 6, 1)));
        assert!(!is_weekend(date(2024, 6, 3)));
        assert_eq!(days_between(date(2024, 6, 1), date(2024, 6, 11)), 10);
    }

    #[test]
    fn working_days_skip_weekends() {
        // Thursday + 3 working days lands on Tuesday
        assert_eq!(add_working_days(date(2024, 6, 6), 3), Some(date(2024, 6, 11)));
        // Saturday + 1 working day lands on Monday
        assert_eq!(add_working_days(date(2024, 6, 1), 1), Some(date(2024, 6, 3)));
        assert_eq!(add_working_days(date(2024, 6, 3), 0), Some(date(2024, 6, 3)));
        assert_eq!(add_working_days(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn recurrence_at_the_end_of_the_calendar_stops() {
        assert_eq!(TaskFrequency::Daily.next_due_date(NaiveDate::MAX), None);
        assert_eq!(TaskFrequency::Weekly.next_due_date(NaiveDate::MAX), None);
        assert_eq!(TaskFrequency::Annually.next_due_date(NaiveDate::MAX), None);
    }

    #[test]
    fn windows_count_both_ends() {
        assert_eq!(window_start(date(2024, 6, 30), 30), Some(date(2024, 6, 1)));
        assert_eq!(window_start(date(2024, 6, 30), 0), Some(date(2024, 6, 30)));
        assert_eq!(window_start(NaiveDate::MIN, 2), None);
    }
}
