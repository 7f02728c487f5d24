use crate::entities::{status, task};
use crate::task::TaskStatus;
use sea_orm::*;
use std::fmt;

pub mod api;
pub mod web;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// A duration split into whole days, hours, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolutionTime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl ResolutionTime {
    pub fn from_seconds(total: u64) -> Self {
        let days = total / SECONDS_PER_DAY;
        let remainder = total % SECONDS_PER_DAY;
        let hours = remainder / SECONDS_PER_HOUR;
        let remainder = remainder % SECONDS_PER_HOUR;
        let minutes = remainder / SECONDS_PER_MINUTE;
        let seconds = remainder % SECONDS_PER_MINUTE;
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }
}

/// Renders e.g. `1 д. 1 чac. 1 мин. 5 сек.`, leaving out zero components.
impl fmt::Display for ResolutionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.days, "д."),
            (self.hours, "чac."),
            (self.minutes, "мин."),
            (self.seconds, "сек."),
        ]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{} {}", value, unit))
        .collect();

        if parts.is_empty() {
            f.write_str("0 сек.")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// Average of the given durations in whole seconds, or 0 for an empty slice.
/// Negative durations count as zero.
pub fn average_seconds(durations: &[chrono::Duration]) -> u64 {
    if durations.is_empty() {
        return 0;
    }
    let total_millis: i64 = durations
        .iter()
        .map(|duration| duration.num_milliseconds().max(0))
        .sum();
    (total_millis / durations.len() as i64 / 1000) as u64
}

/// Number of tasks currently sitting in one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    status_id: u32,
    name: String,
    count: u64,
}

impl StatusCount {
    pub fn new(status_id: u32, name: String, count: u64) -> Self {
        Self {
            status_id,
            name,
            count,
        }
    }

    pub fn status_id(&self) -> u32 {
        self.status_id
    }

    /// Returns the status name as stored in the lookup table.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    counts: Vec<StatusCount>,
    average_resolution: ResolutionTime,
}

impl Statistics {
    pub fn new(counts: Vec<StatusCount>, average_resolution: ResolutionTime) -> Self {
        Self {
            counts,
            average_resolution,
        }
    }

    /// Per-status counts, ordered by status ID.
    pub fn counts(&self) -> &[StatusCount] {
        &self.counts
    }

    pub fn count_for(&self, status: TaskStatus) -> u64 {
        self.counts
            .iter()
            .find(|count| count.status_id as i32 == status.id())
            .map_or(0, StatusCount::count)
    }

    pub fn total_tasks(&self) -> u64 {
        self.counts.iter().map(StatusCount::count).sum()
    }

    /// Average time from creation to the last update of finished tasks.
    pub fn average_resolution(&self) -> ResolutionTime {
        self.average_resolution
    }
}

/// Error type for StatisticsService operations.
#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub struct StatisticsService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl StatisticsService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> StatisticsService<'_> {
        StatisticsService { db }
    }

    /// Counts tasks per status and averages the resolution time of done tasks.
    /// Scans the task table on every call.
    #[tracing::instrument(skip(self))]
    pub async fn compute(&self) -> Result<Statistics, StatisticsError> {
        let statuses = status::Entity::find()
            .order_by_asc(status::Column::Id)
            .all(self.db)
            .await?;

        let mut counts = Vec::with_capacity(statuses.len());
        for status in statuses {
            let count = task::Entity::find()
                .filter(task::Column::StatusId.eq(status.id))
                .count(self.db)
                .await?;
            counts.push(StatusCount::new(status.id as u32, status.name, count));
        }

        let durations: Vec<chrono::Duration> = task::Entity::find()
            .filter(task::Column::StatusId.eq(TaskStatus::Done.id()))
            .all(self.db)
            .await?
            .into_iter()
            .map(|task| task.updated_at - task.created_at)
            .collect();
        let average_resolution = ResolutionTime::from_seconds(average_seconds(&durations));

        Ok(Statistics::new(counts, average_resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn can_decompose_seconds() {
        assert_eq!(
            ResolutionTime::from_seconds(90065),
            ResolutionTime {
                days: 1,
                hours: 1,
                minutes: 1,
                seconds: 5,
            }
        );
        assert_eq!(ResolutionTime::from_seconds(90065).total_seconds(), 90065);
    }

    #[test]
    fn can_render_all_components() {
        insta::assert_snapshot!(ResolutionTime::from_seconds(90065), @"1 д. 1 чac. 1 мин. 5 сек.");
    }

    #[test]
    fn omits_zero_components() {
        insta::assert_snapshot!(ResolutionTime::from_seconds(86_400 + 5), @"1 д. 5 сек.");
        insta::assert_snapshot!(ResolutionTime::from_seconds(2 * 3_600), @"2 чac.");
        insta::assert_snapshot!(ResolutionTime::from_seconds(59), @"59 сек.");
    }

    #[test]
    fn renders_zero_duration() {
        insta::assert_snapshot!(ResolutionTime::from_seconds(0), @"0 сек.");
    }

    #[test]
    fn average_of_no_durations_is_zero() {
        assert_eq!(average_seconds(&[]), 0);
    }

    #[test]
    fn average_floors_to_whole_seconds() {
        let durations = [Duration::seconds(10), Duration::seconds(15)];
        assert_eq!(average_seconds(&durations), 12);

        let durations = [Duration::milliseconds(1_999)];
        assert_eq!(average_seconds(&durations), 1);
    }

    #[test]
    fn negative_durations_count_as_zero() {
        let durations = [Duration::seconds(-30), Duration::seconds(30)];
        assert_eq!(average_seconds(&durations), 15);
    }

    #[test]
    fn statistics_sum_counts() {
        let statistics = Statistics::new(
            vec![
                StatusCount::new(1, "Открыта".to_string(), 2),
                StatusCount::new(4, "Выполнена".to_string(), 3),
            ],
            ResolutionTime::default(),
        );
        assert_eq!(statistics.total_tasks(), 5);
        assert_eq!(statistics.count_for(TaskStatus::Done), 3);
        assert_eq!(statistics.count_for(TaskStatus::Rejected), 0);
    }
}
