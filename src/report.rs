use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    CapacityOverview, CoachCapacity, CoachNps, NpsCategory, NpsResponse, NpsResult, NpsTrendPoint,
};
use crate::nps::{categorize, classify, format_score};

pub fn summarize_capacity(capacities: &[CoachCapacity]) -> CapacityOverview {
    let mut overview = CapacityOverview {
        coach_count: capacities.len(),
        ..CapacityOverview::default()
    };

    for coach in capacities {
        if coach.state.is_paused {
            overview.paused_coaches += 1;
        } else {
            overview.active_coaches += 1;
        }
        if coach.state.is_over_capacity {
            overview.over_capacity += 1;
        }
        overview.total_units += coach.state.current_units;
        overview.total_capacity += coach.state.effective_capacity;
    }

    overview
}

pub fn describe_nps(result: &NpsResult) -> String {
    if result.total_responses == 0 {
        return "no responses".to_string();
    }
    format!(
        "{} ({}) from {} responses: {:.0}% promoters, {:.0}% passives, {:.0}% detractors",
        format_score(result.score),
        categorize(result.score),
        result.total_responses,
        result.percentages.promoters,
        result.percentages.passives,
        result.percentages.detractors
    )
}

pub struct ReportInput<'a> {
    pub scope: Option<&'a str>,
    pub since_days: i64,
    pub cutoff: NaiveDate,
    pub capacities: &'a [CoachCapacity],
    pub overall: &'a NpsResult,
    pub by_coach: &'a [CoachNps],
    pub trend: &'a [NpsTrendPoint],
    pub responses: &'a [NpsResponse],
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let overview = summarize_capacity(input.capacities);
    let mut output = String::new();
    let scope_label = input.scope.unwrap_or("all coaches");

    let _ = writeln!(output, "# Coaching Operations Report");
    let _ = writeln!(
        output,
        "Generated for {} (feedback from the last {} days, since {})",
        scope_label, input.since_days, input.cutoff
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Capacity Overview");

    if input.capacities.is_empty() {
        let _ = writeln!(output, "No coaches found.");
    } else {
        let _ = writeln!(
            output,
            "- {} coaches ({} active, {} paused), {} over capacity",
            overview.coach_count,
            overview.active_coaches,
            overview.paused_coaches,
            overview.over_capacity
        );
        let _ = writeln!(
            output,
            "- {:.1} units allocated against {:.1} units of capacity",
            overview.total_units, overview.total_capacity
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "## Coach Utilization");
        for coach in input.capacities {
            let _ = writeln!(
                output,
                "- {} ({}): {:.1} / {:.1} units, {}% [{}] across {} active clients",
                coach.coach_name,
                coach.coach_email,
                coach.state.current_units,
                coach.state.effective_capacity,
                coach.state.utilization_percentage,
                coach.level,
                coach.active_clients
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Net Promoter Score");
    let _ = writeln!(output, "Overall: {}", describe_nps(input.overall));

    if !input.by_coach.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### By Coach");
        for coach in input.by_coach {
            let _ = writeln!(
                output,
                "- {}: {}",
                coach.coach_name,
                describe_nps(&coach.result)
            );
        }
    }

    if !input.trend.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Monthly Trend");
        for point in input.trend {
            let _ = writeln!(
                output,
                "- {}: {} ({} responses)",
                point.month_start.format("%Y-%m"),
                format_score(point.result.score),
                point.result.total_responses
            );
        }
    }

    let mut detractor_feedback: Vec<&NpsResponse> = input
        .responses
        .iter()
        .filter(|response| classify(response.score) == NpsCategory::Detractor)
        .filter(|response| response.comment.is_some())
        .collect();
    detractor_feedback.sort_by(|a, b| b.responded_at.cmp(&a.responded_at));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Detractor Feedback");

    if detractor_feedback.is_empty() {
        let _ = writeln!(output, "No detractor comments in this window.");
    } else {
        for response in detractor_feedback.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} (score {}, coach {}) on {}: {}",
                response.client_name,
                response.score.value(),
                response.coach_name.as_deref().unwrap_or("unassigned"),
                response.responded_at,
                response.comment.as_deref().unwrap_or_default()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::summarize_coaches;
    use crate::models::{
        CapacityCeiling, ClientStatus, ClientUnit, CoachRecord, NpsScore,
    };
    use crate::nps::{aggregate_from_scores, monthly_trend, nps_by_coach};
    use chrono::Utc;
    use uuid::Uuid;

    fn coach(name: &str, ceiling: CapacityCeiling, is_paused: bool) -> CoachRecord {
        CoachRecord {
            coach_id: Uuid::new_v4(),
            coach_name: name.to_string(),
            coach_email: format!("{}@example.com", name.to_lowercase()),
            ceiling,
            is_paused,
        }
    }

    fn unit(coach_id: Uuid, units: f64) -> ClientUnit {
        ClientUnit {
            client_id: Uuid::new_v4(),
            coach_id,
            calculated_units: units,
            status: ClientStatus::Active,
            calculated_at: Utc::now(),
        }
    }

    fn response(coach: &CoachRecord, score: i32, comment: Option<&str>, day: u32) -> NpsResponse {
        NpsResponse {
            response_id: Uuid::new_v4(),
            client_name: "Noor Haddad".to_string(),
            coach_id: Some(coach.coach_id),
            coach_name: Some(coach.coach_name.clone()),
            score: NpsScore::new(score).unwrap(),
            comment: comment.map(str::to_string),
            responded_at: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
        }
    }

    #[test]
    fn overview_counts_paused_and_over_capacity() {
        let over = coach("Jules", CapacityCeiling::Explicit(2.0), false);
        let paused = coach("Kiara", CapacityCeiling::UseDefault, true);
        let units = vec![unit(over.coach_id, 3.0), unit(paused.coach_id, 1.0)];
        let capacities = summarize_coaches(&[over, paused], &units, 20.0);

        let overview = summarize_capacity(&capacities);
        assert_eq!(overview.coach_count, 2);
        assert_eq!(overview.active_coaches, 1);
        assert_eq!(overview.paused_coaches, 1);
        assert_eq!(overview.over_capacity, 1);
        assert_eq!(overview.total_units, 4.0);
        assert_eq!(overview.total_capacity, 2.0);
    }

    #[test]
    fn describes_empty_nps() {
        assert_eq!(describe_nps(&NpsResult::default()), "no responses");
    }

    #[test]
    fn report_includes_sections() {
        let avery = coach("Avery", CapacityCeiling::UseDefault, false);
        let units = vec![unit(avery.coach_id, 15.0)];
        let capacities = summarize_coaches(std::slice::from_ref(&avery), &units, 20.0);

        let responses = vec![
            response(&avery, 10, Some("Great sessions"), 10),
            response(&avery, 3, Some("Hard to book time"), 12),
            response(&avery, 8, None, 14),
        ];
        let scores: Vec<NpsScore> = responses.iter().map(|r| r.score).collect();
        let overall = aggregate_from_scores(&scores);
        let by_coach = nps_by_coach(&responses);
        let trend = monthly_trend(&responses);

        let report = build_report(&ReportInput {
            scope: Some("avery@example.com"),
            since_days: 90,
            cutoff: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            capacities: &capacities,
            overall: &overall,
            by_coach: &by_coach,
            trend: &trend,
            responses: &responses,
        });

        assert!(report.contains("Generated for avery@example.com"));
        assert!(report.contains("15.0 / 20.0 units, 75% [Available]"));
        assert!(report.contains("Overall: 0 (Needs Improvement) from 3 responses"));
        assert!(report.contains("- 2026-02: 0 (3 responses)"));
        assert!(report.contains("Hard to book time"));
        assert!(!report.contains("Great sessions"));
    }

    #[test]
    fn report_handles_empty_data() {
        let report = build_report(&ReportInput {
            scope: None,
            since_days: 30,
            cutoff: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            capacities: &[],
            overall: &NpsResult::default(),
            by_coach: &[],
            trend: &[],
            responses: &[],
        });

        assert!(report.contains("Generated for all coaches"));
        assert!(report.contains("No coaches found."));
        assert!(report.contains("Overall: no responses"));
        assert!(report.contains("No detractor comments in this window."));
    }
}
