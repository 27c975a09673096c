//! Net Promoter Score aggregation.
//!
//! Scores are bucketed into detractors (0-6), passives (7-8) and promoters
//! (9-10). The aggregate score is the promoter share minus the detractor
//! share, rounded to an integer in [-100, 100]. Empty input yields the
//! all-zero result.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    CoachNps, NpsCategory, NpsDistribution, NpsPercentages, NpsResponse, NpsResult, NpsScore,
    NpsTrendPoint, ScoreGrade,
};

pub fn classify(score: NpsScore) -> NpsCategory {
    match score.value() {
        0..=6 => NpsCategory::Detractor,
        7 | 8 => NpsCategory::Passive,
        _ => NpsCategory::Promoter,
    }
}

pub fn tally<'a, I>(scores: I) -> NpsDistribution
where
    I: IntoIterator<Item = &'a NpsScore>,
{
    let mut distribution = NpsDistribution::default();
    for score in scores {
        distribution.record(classify(*score));
    }
    distribution
}

pub fn aggregate_from_scores(scores: &[NpsScore]) -> NpsResult {
    aggregate_from_distribution(tally(scores))
}

pub fn aggregate_from_distribution(distribution: NpsDistribution) -> NpsResult {
    let total_responses = distribution.total();
    if total_responses == 0 {
        return NpsResult::default();
    }

    let share = |count: u64| count as f64 / total_responses as f64 * 100.0;
    let percentages = NpsPercentages {
        detractors: share(distribution.detractors),
        passives: share(distribution.passives),
        promoters: share(distribution.promoters),
    };

    NpsResult {
        score: (percentages.promoters - percentages.detractors).round() as i32,
        distribution,
        percentages,
        total_responses,
    }
}

pub fn format_score(score: i32) -> String {
    if score > 0 {
        format!("+{score}")
    } else {
        score.to_string()
    }
}

pub fn categorize(score: i32) -> ScoreGrade {
    if score >= 70 {
        ScoreGrade::Excellent
    } else if score >= 30 {
        ScoreGrade::Good
    } else if score >= 0 {
        ScoreGrade::NeedsImprovement
    } else {
        ScoreGrade::Critical
    }
}

/// Aggregates responses per coach, best score first. Responses not linked to
/// a coach only count towards the overall score.
pub fn nps_by_coach(responses: &[NpsResponse]) -> Vec<CoachNps> {
    let mut grouped: HashMap<Uuid, (String, NpsDistribution)> = HashMap::new();

    for response in responses {
        let Some(coach_id) = response.coach_id else {
            continue;
        };
        let entry = grouped.entry(coach_id).or_insert_with(|| {
            (
                response.coach_name.clone().unwrap_or_default(),
                NpsDistribution::default(),
            )
        });
        entry.1.record(classify(response.score));
    }

    let mut results: Vec<CoachNps> = grouped
        .into_iter()
        .map(|(coach_id, (coach_name, distribution))| CoachNps {
            coach_id,
            coach_name,
            result: aggregate_from_distribution(distribution),
        })
        .collect();

    results.sort_by(|a, b| {
        b.result
            .score
            .cmp(&a.result.score)
            .then_with(|| a.coach_name.cmp(&b.coach_name))
    });
    results
}

/// First day of the response window; always at least one day back.
pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.max(1))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Calendar-month NPS, oldest month first.
pub fn monthly_trend(responses: &[NpsResponse]) -> Vec<NpsTrendPoint> {
    let mut months: BTreeMap<NaiveDate, NpsDistribution> = BTreeMap::new();

    for response in responses {
        months
            .entry(month_start(response.responded_at))
            .or_default()
            .record(classify(response.score));
    }

    months
        .into_iter()
        .map(|(month_start, distribution)| NpsTrendPoint {
            month_start,
            result: aggregate_from_distribution(distribution),
        })
        .collect()
}
