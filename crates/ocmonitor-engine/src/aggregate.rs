use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use ocmonitor_types::{InteractionRecord, SessionRecord, TokenUsage};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::cost::{CostCalculator, CostTotals};
use crate::usage::ModelUsage;

// NOTE: Calendar buckets
//
// - Buckets use the UTC date of each interaction's timestamp.
// - A session counts toward every bucket it has an interaction in.
// - Interactions without a model are grouped under "unknown".

const UNKNOWN_MODEL: &str = "unknown";

/// Usage and cost of one model inside a tally
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelTally {
    pub usage: ModelUsage,
    pub cost: CostTotals,
}

/// Running totals over a set of interactions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTally {
    pub sessions: BTreeSet<String>,
    pub interactions: usize,
    pub tokens: TokenUsage,
    pub cost: CostTotals,
    /// Keyed by the model's display form
    pub by_model: BTreeMap<String, ModelTally>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl UsageTally {
    pub fn add(&mut self, record: &InteractionRecord, calculator: &CostCalculator<'_>) {
        self.sessions.insert(record.session_id.clone());
        self.interactions += 1;
        self.tokens += record.tokens;
        self.last_activity = Some(
            self.last_activity
                .map_or(record.timestamp, |t| t.max(record.timestamp)),
        );

        let key = record
            .model
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let model = self.by_model.entry(key).or_default();
        model.usage.interactions += 1;
        model.usage.tokens += record.tokens;

        if let Some(cost) = calculator.interaction_cost(record) {
            self.cost.record(record.model.as_ref(), cost);
            model.cost.record(record.model.as_ref(), cost);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn merge(&mut self, other: &UsageTally) {
        self.sessions.extend(other.sessions.iter().cloned());
        self.interactions += other.interactions;
        self.tokens += other.tokens;
        self.cost.merge(&other.cost);
        for (key, tally) in &other.by_model {
            let model = self.by_model.entry(key.clone()).or_default();
            model.usage.interactions += tally.usage.interactions;
            model.usage.tokens += tally.usage.tokens;
            model.cost.merge(&tally.cost);
        }
        self.last_activity = match (self.last_activity, other.last_activity) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Inclusive range of UTC dates; an open end is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Every day of one calendar month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(chrono::Months::new(1))?.pred_opt()?;
        Some(Self::between(Some(start), Some(end)))
    }

    /// Every day of one calendar year
    pub fn year(year: i32) -> Option<Self> {
        Some(Self::between(
            Some(NaiveDate::from_ymd_opt(year, 1, 1)?),
            Some(NaiveDate::from_ymd_opt(year, 12, 31)?),
        ))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    pub fn contains_time(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }
}

/// Calendar granularity of a usage report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    Daily,
    /// Weeks beginning on `start`
    Weekly { start: Weekday },
    Monthly,
}

impl Period {
    /// First day of the bucket holding `date`
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Daily => date,
            Period::Weekly { start } => {
                let offset = (date.weekday().num_days_from_monday() + 7
                    - start.num_days_from_monday())
                    % 7;
                date.checked_sub_days(Days::new(offset.into()))
                    .unwrap_or(date)
            }
            Period::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Period::Daily => start.format("%Y-%m-%d").to_string(),
            Period::Weekly { .. } => {
                let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
                format!("{} .. {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            Period::Monthly => start.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Daily => write!(f, "daily"),
            Period::Weekly { start } => write!(f, "weekly (from {})", start),
            Period::Monthly => write!(f, "monthly"),
        }
    }
}

/// Usage inside one calendar bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodUsage {
    pub start: NaiveDate,
    pub label: String,
    pub tally: UsageTally,
}

/// Group interactions into calendar buckets, oldest first. Interactions outside
/// `range` are ignored.
pub fn usage_by_period<'r, I>(
    records: I,
    period: Period,
    range: &DateRange,
    calculator: &CostCalculator<'_>,
) -> Vec<PeriodUsage>
where
    I: IntoIterator<Item = &'r InteractionRecord>,
{
    let mut buckets: BTreeMap<NaiveDate, UsageTally> = BTreeMap::new();
    for record in records {
        let date = record.timestamp.date_naive();
        if !range.contains(date) {
            continue;
        }
        buckets
            .entry(period.bucket_start(date))
            .or_default()
            .add(record, calculator);
    }

    buckets
        .into_iter()
        .map(|(start, tally)| PeriodUsage {
            start,
            label: period.label(start),
            tally,
        })
        .collect()
}

/// Usage of one project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectUsage {
    /// Last path component of the project worktree, or "unknown"
    pub name: String,
    pub path: Option<String>,
    pub tally: UsageTally,
}

/// Group interactions by the project of their workflow's root session.
///
/// Each item pairs an interaction with the root session of the workflow it
/// belongs to, so sub-agent work is counted toward the project that spawned it.
/// Ordered by cost, highest first, then by name.
pub fn usage_by_project<'r, I>(
    items: I,
    range: &DateRange,
    calculator: &CostCalculator<'_>,
) -> Vec<ProjectUsage>
where
    I: IntoIterator<Item = (&'r SessionRecord, &'r InteractionRecord)>,
{
    let mut projects: BTreeMap<Option<String>, ProjectUsage> = BTreeMap::new();
    for (root, record) in items {
        if !range.contains_time(record.timestamp) {
            continue;
        }
        projects
            .entry(root.project_path.clone())
            .or_insert_with(|| ProjectUsage {
                name: root.project_name().to_string(),
                path: root.project_path.clone(),
                tally: UsageTally::default(),
            })
            .tally
            .add(record, calculator);
    }

    let mut projects: Vec<ProjectUsage> = projects.into_values().collect();
    projects.sort_by(|a, b| {
        b.tally
            .cost
            .amount
            .total_cmp(&a.tally.cost.amount)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
    projects
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ocmonitor_types::{ModelRef, PriceEntry, PriceFields, SourceKind};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(id: &str, session: &str, model: Option<&str>, at: (i32, u32, u32, u32)) -> InteractionRecord {
        InteractionRecord {
            id: id.to_string(),
            session_id: session.to_string(),
            role: "assistant".to_string(),
            model: model.map(ModelRef::bare),
            tokens: TokenUsage::new(1_000, 100, 0, 0),
            timestamp: Utc.with_ymd_and_hms(at.0, at.1, at.2, at.3, 0, 0).unwrap(),
            completed_at: None,
        }
    }

    fn prices() -> BTreeMap<ModelRef, PriceEntry> {
        let mut entry = PriceEntry::new("priced");
        entry.fields = PriceFields {
            input_price: Some(1.0),
            output_price: Some(10.0),
            ..Default::default()
        };
        BTreeMap::from([(ModelRef::bare("priced"), entry)])
    }

    fn root(id: &str, project: Option<&str>) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            parent_id: None,
            project_path: project.map(String::from),
            title: None,
            source: SourceKind::Relational,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_week_start_follows_chosen_day() {
        // 2024-01-17 is a Wednesday
        let wed = day(2024, 1, 17);
        assert_eq!(Period::Weekly { start: Weekday::Mon }.bucket_start(wed), day(2024, 1, 15));
        assert_eq!(Period::Weekly { start: Weekday::Sun }.bucket_start(wed), day(2024, 1, 14));
        assert_eq!(Period::Weekly { start: Weekday::Wed }.bucket_start(wed), wed);
        assert_eq!(Period::Weekly { start: Weekday::Thu }.bucket_start(wed), day(2024, 1, 11));
        assert_eq!(Period::Monthly.bucket_start(wed), day(2024, 1, 1));
        assert_eq!(
            Period::Weekly { start: Weekday::Mon }.label(day(2024, 1, 15)),
            "2024-01-15 .. 2024-01-21"
        );
    }

    #[test]
    fn test_month_and_year_ranges() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert!(feb.contains(day(2024, 2, 29)));
        assert!(!feb.contains(day(2024, 3, 1)));
        assert!(!feb.contains(day(2024, 1, 31)));
        assert!(DateRange::month(2024, 13).is_none());

        let year = DateRange::year(2023).unwrap();
        assert!(year.contains(day(2023, 12, 31)));
        assert!(!year.contains(day(2024, 1, 1)));
        assert!(DateRange::all().contains(day(1999, 1, 1)));
    }

    #[test]
    fn test_daily_buckets_with_costs() {
        let prices = prices();
        let calculator = CostCalculator::new(&prices);
        let records = vec![
            record("m1", "ses_a", Some("priced"), (2024, 1, 15, 9)),
            record("m2", "ses_b", Some("priced"), (2024, 1, 15, 23)),
            record("m3", "ses_a", Some("mystery"), (2024, 1, 16, 1)),
        ];

        let buckets = usage_by_period(&records, Period::Daily, &DateRange::all(), &calculator);

        assert_eq!(buckets.len(), 2);
        let first = &buckets[0];
        assert_eq!(first.label, "2024-01-15");
        assert_eq!(first.tally.session_count(), 2);
        assert_eq!(first.tally.interactions, 2);
        assert_eq!(first.tally.tokens.input, 2_000);
        // 1000 * 1/M + 100 * 10/M per interaction
        assert!((first.tally.cost.amount - 0.004).abs() < 1e-9);
        assert!(first.tally.cost.is_complete());

        let second = &buckets[1];
        assert_eq!(second.label, "2024-01-16");
        assert!(!second.tally.cost.is_complete());
        assert_eq!(second.tally.by_model["mystery"].usage.interactions, 1);
    }

    #[test]
    fn test_range_filters_and_monthly_groups() {
        let prices = prices();
        let calculator = CostCalculator::new(&prices);
        let records = vec![
            record("m1", "ses_a", Some("priced"), (2023, 12, 31, 12)),
            record("m2", "ses_a", Some("priced"), (2024, 1, 2, 12)),
            record("m3", "ses_b", None, (2024, 1, 30, 12)),
            record("m4", "ses_c", Some("priced"), (2024, 2, 1, 12)),
        ];
        let range = DateRange::year(2024).unwrap();

        let buckets = usage_by_period(&records, Period::Monthly, &range, &calculator);

        let labels: Vec<_> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02"]);
        assert_eq!(buckets[0].tally.interactions, 2);
        assert_eq!(buckets[0].tally.by_model["unknown"].usage.interactions, 1);
        assert_eq!(buckets[1].tally.session_count(), 1);
    }

    #[test]
    fn test_projects_follow_workflow_root() {
        let prices = prices();
        let calculator = CostCalculator::new(&prices);
        let app = root("A", Some("/work/app"));
        let lib = root("L", Some("/work/lib"));
        let loose = root("X", None);
        let records = vec![
            record("m1", "A", Some("priced"), (2024, 1, 1, 1)),
            record("m2", "B", Some("priced"), (2024, 1, 1, 2)),
            record("m3", "L", Some("priced"), (2024, 1, 1, 3)),
            record("m4", "X", None, (2024, 1, 1, 4)),
        ];
        let items = vec![
            (&app, &records[0]),
            (&app, &records[1]),
            (&lib, &records[2]),
            (&loose, &records[3]),
        ];

        let projects = usage_by_project(items, &DateRange::all(), &calculator);

        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["app", "lib", "unknown"]);
        assert_eq!(projects[0].tally.session_count(), 2);
        assert_eq!(projects[0].path.as_deref(), Some("/work/app"));
        assert_eq!(projects[2].tally.cost.amount, 0.0);
    }

    #[test]
    fn test_merge_combines_tallies() {
        let prices = prices();
        let calculator = CostCalculator::new(&prices);
        let mut a = UsageTally::default();
        a.add(&record("m1", "ses_a", Some("priced"), (2024, 1, 1, 1)), &calculator);
        let mut b = UsageTally::default();
        b.add(&record("m2", "ses_b", Some("other"), (2024, 1, 2, 1)), &calculator);

        a.merge(&b);
        assert_eq!(a.interactions, 2);
        assert_eq!(a.session_count(), 2);
        assert_eq!(a.by_model.len(), 2);
        assert_eq!(a.cost.unpriced_interactions, 1);
        assert_eq!(
            a.last_activity,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap())
        );
    }
}
