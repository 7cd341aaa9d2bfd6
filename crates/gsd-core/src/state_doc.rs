//! STATE.md: position, progress, activity and velocity.
//!
//! Velocity is a rate over activity data points. The data points are the
//! `Last activity:` date plus every line that starts with an ISO date
//! (`- 2026-02-08 …`, `| 2026-02-08 14:30 | … |`), counted once per distinct
//! timestamp. The rate is the number of points inside the trailing window that
//! ends at the newest point, divided by the window length in days.

use crate::parse::{Note, ParseOptions, Parsed};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatePosition {
    /// Text after `Phase:`, e.g. `5 of 7 (Template Versioning)`.
    pub label: Option<String>,
    pub phase_number: Option<u32>,
    pub total_phases: Option<u32>,
    pub phase_name: Option<String>,
    pub not_started: bool,
    pub milestone_complete: bool,
    pub milestone_version: Option<String>,
    pub phases_shipped: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateMetrics {
    /// 0–100.
    pub progress_percent: u8,
    /// Activity entries per day over the trailing window; `None` with fewer
    /// than two data points.
    pub velocity: Option<f64>,
    pub last_activity: Option<DateTime<Utc>>,
    /// Free text of the `Last activity:` line.
    pub last_activity_note: Option<String>,
    pub activity_points: usize,
    pub position: StatePosition,
    pub status: Option<String>,
    pub average_duration: Option<String>,
    pub plans_completed: Option<u32>,
    pub concerns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).unwrap())
        }
    };
}

re!(position_of_re, r"^(\d+)\s+of\s+(\d+)\s*\(([^)]+)\)");
re!(position_shipped_re, r"^(v\d+(?:\.\d+)*)\s+complete\s*[-—–]\s*(\d+)\s+of\s+(\d+)\s+phases?\s+shipped");
re!(position_not_started_re, r"(?i)^not\s+started");
re!(position_dash_re, r"^(\d+)\s*[-—–:]\s*(.+)$");
re!(progress_bar_re, r"(?i)Progress:\s*\[[^\]]*\]\s*(\d+)\s*%");
re!(progress_count_re, r"(\d+)\s*%\s*\(\d+\s*/\s*\d+\s+\w+");
re!(bare_bar_re, r"\[[█░▓▒■□#=\-. ]+\]\s*(\d+)\s*%");
re!(progress_any_re, r"(?i)Progress:.*?(\d+)\s*%");
re!(field_re, r"^(?P<key>[A-Za-z][A-Za-z ]*?):\s*(?P<value>.*)$");
re!(heading_re, r"^#{1,6}\s+(?P<text>.+)$");
re!(list_item_re, r"^[-*+]\s+(?P<text>.+)$");
re!(dated_line_re, r"^(?:[-*+]\s+|\|\s*)?(?P<date>\d{4}-\d{2}-\d{2})(?:[ T](?P<h>\d{2}):(?P<m>\d{2}))?");
re!(date_re, r"(?P<date>\d{4}-\d{2}-\d{2})(?:[ T](?P<h>\d{2}):(?P<m>\d{2}))?");

/// Strip list markers and bold markers so `- **Status:** x` reads as `Status: x`.
fn normalize(line: &str) -> String {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    line.replace("**", "").trim().to_string()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub fn parse(text: &str, options: &ParseOptions) -> Parsed<StateMetrics> {
    let mut notes = Vec::new();
    let mut metrics = StateMetrics::default();
    let mut entry_points: Vec<DateTime<Utc>> = Vec::new();
    let mut last_activity_point: Option<DateTime<Utc>> = None;
    let mut in_concerns = false;
    let mut seen_position = false;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = normalize(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = heading_re().captures(&line) {
            let heading = caps["text"].to_lowercase();
            in_concerns = heading.contains("blocker") || heading.contains("concern");
            continue;
        }

        if let Some(caps) = dated_line_re().captures(raw.trim()) {
            match point_from_caps(&caps) {
                Some(point) => entry_points.push(point),
                None => notes.push(Note::at(line_no, format!("unparseable date '{}'", &caps["date"]))),
            }
        }

        if in_concerns {
            if let Some(caps) = list_item_re().captures(raw.trim()) {
                let item = caps["text"].replace("**", "").trim().to_string();
                if !item.to_lowercase().starts_with("none") {
                    metrics.concerns.push(item);
                }
                continue;
            }
        }

        let Some(caps) = field_re().captures(&line) else {
            continue;
        };
        let value = caps["value"].trim();
        match caps["key"].trim().to_lowercase().as_str() {
            "phase" if !seen_position => {
                seen_position = true;
                metrics.position = parse_position(value);
            }
            "status" if metrics.status.is_none() => {
                metrics.status = Some(value.to_string());
            }
            "last activity" => {
                metrics.last_activity_note = Some(value.to_string());
                last_activity_point = date_re().captures(value).and_then(|c| point_from_caps(&c));
            }
            "average duration" => metrics.average_duration = Some(value.to_string()),
            "total plans completed" => {
                metrics.plans_completed = value
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse().ok());
            }
            _ => {}
        }
    }

    match parse_progress(text) {
        Some(p) => metrics.progress_percent = p,
        None => notes.push(Note::new("no progress percentage found, assuming 0%")),
    }

    let mut points = entry_points;
    if let Some(point) = last_activity_point {
        if !points.contains(&point) {
            points.push(point);
        }
    }
    metrics.activity_points = points.len();
    metrics.last_activity = points.iter().copied().max();
    metrics.velocity = velocity(&points, options.velocity_window_days);

    Parsed::new(metrics, notes)
}

fn point_from_caps(caps: &regex::Captures<'_>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(&caps["date"], "%Y-%m-%d").ok()?;
    let time = match (caps.name("h"), caps.name("m")) {
        (Some(h), Some(m)) => NaiveTime::from_hms_opt(h.as_str().parse().ok()?, m.as_str().parse().ok()?, 0)?,
        _ => NaiveTime::MIN,
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn parse_position(value: &str) -> StatePosition {
    let mut pos = StatePosition {
        label: Some(value.to_string()),
        ..StatePosition::default()
    };

    if let Some(c) = position_of_re().captures(value) {
        pos.phase_number = c[1].parse().ok();
        pos.total_phases = c[2].parse().ok();
        pos.phase_name = Some(c[3].trim().to_string());
    } else if let Some(c) = position_shipped_re().captures(value) {
        pos.label = Some(format!("{} complete", &c[1]));
        pos.milestone_complete = true;
        pos.milestone_version = Some(c[1].to_string());
        pos.phases_shipped = c[2].parse().ok();
        pos.total_phases = c[3].parse().ok();
    } else if position_not_started_re().is_match(value) {
        pos.label = Some("Not started".to_string());
        pos.not_started = true;
    } else if let Some(c) = position_dash_re().captures(value) {
        pos.phase_number = c[1].parse().ok();
        pos.phase_name = Some(c[2].trim().to_string());
    }
    pos
}

/// Progress percentage, first matching format wins. Clamped to 100.
pub fn parse_progress(text: &str) -> Option<u8> {
    let res = [
        progress_bar_re(),
        progress_count_re(),
        bare_bar_re(),
        progress_any_re(),
    ];
    res.iter()
        .find_map(|re| re.captures(text).and_then(|c| c[1].parse::<u32>().ok()))
        .map(|p| p.min(100) as u8)
}

/// Points per day inside `(newest - window, newest]`.
pub fn velocity(points: &[DateTime<Utc>], window_days: u32) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let window_days = window_days.max(1);
    let newest = points.iter().max()?;
    let start = *newest - Duration::days(i64::from(window_days));
    let in_window = points.iter().filter(|p| **p > start).count();
    Some(in_window as f64 / f64::from(window_days))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> StateMetrics {
        parse(text, &ParseOptions::default()).value
    }

    fn at(s: &str) -> DateTime<Utc> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
    }

    #[test]
    fn position_of_format() {
        let s = state("Phase: 5 of 7 (Template Versioning)\nProgress: [██████░░░░] 60%\n");
        assert_eq!(s.position.label.as_deref(), Some("5 of 7 (Template Versioning)"));
        assert_eq!(s.position.phase_number, Some(5));
        assert_eq!(s.position.total_phases, Some(7));
        assert_eq!(s.position.phase_name.as_deref(), Some("Template Versioning"));
        assert_eq!(s.progress_percent, 60);
    }

    #[test]
    fn position_milestone_complete() {
        let s = state("Phase: v1.0 complete — 7 of 7 phases shipped\n");
        assert_eq!(s.position.label.as_deref(), Some("v1.0 complete"));
        assert!(s.position.milestone_complete);
        assert_eq!(s.position.milestone_version.as_deref(), Some("v1.0"));
        assert_eq!(s.position.phases_shipped, Some(7));
        assert_eq!(s.position.total_phases, Some(7));
    }

    #[test]
    fn position_not_started_and_bold_dash() {
        let s = state("Phase: Not started\n");
        assert!(s.position.not_started);
        assert_eq!(s.position.label.as_deref(), Some("Not started"));

        let s = state("**Phase:** 1 - Foundation & Type Safety\n");
        assert_eq!(s.position.phase_number, Some(1));
        assert_eq!(s.position.phase_name.as_deref(), Some("Foundation & Type Safety"));
    }

    #[test]
    fn progress_formats() {
        assert_eq!(parse_progress("Progress: [██████████] 100%"), Some(100));
        assert_eq!(parse_progress("Progress: [░░░░░░░░░░] 0%"), Some(0));
        assert_eq!(parse_progress("75% (12/16 plans completed)"), Some(75));
        assert_eq!(parse_progress("[████████░░░░░░░░░░░░] 38% (10/26 requirements)"), Some(38));
        assert_eq!(parse_progress("[██████░░░░] 60%"), Some(60));
        assert_eq!(parse_progress("Progress: about 40% done"), Some(40));
        assert_eq!(parse_progress("Progress: [███] 250%"), Some(100));
        assert_eq!(parse_progress("Status: In progress"), None);
    }

    #[test]
    fn unparseable_percentage_falls_through_to_next_format() {
        let text = "Progress: [███] 99999999999%\n75% (12/16 plans completed)\n";
        assert_eq!(parse_progress(text), Some(75));
    }

    #[test]
    fn missing_progress_is_noted() {
        let parsed = parse("Phase: 1 of 2 (Test)\nStatus: In progress\n", &ParseOptions::default());
        assert_eq!(parsed.value.progress_percent, 0);
        assert_eq!(parsed.notes.len(), 1);
        assert_eq!(parsed.value.status.as_deref(), Some("In progress"));
    }

    #[test]
    fn full_document() {
        let text = "# Project State\n\n## Current Position\n\nPhase: 1 of 2 (Robust Parsing)\nPlan: 0 of TBD in current phase\nStatus: Ready to plan\nLast activity: 2026-02-08 — Roadmap created\nProgress: [░░░░░░░░░░] 0%\n\n## Performance Metrics\n\n**Velocity:**\n- Total plans completed: 4\n- Average duration: 12 min\n\n### Blockers/Concerns\n\n- API rate limits unclear\n- **Auth provider** not chosen\n\n## Session Continuity\n\nLast session: 2026-02-08\n";
        let parsed = parse(text, &ParseOptions::default());
        assert!(parsed.notes.is_empty(), "{:?}", parsed.notes);
        let s = parsed.value;
        assert_eq!(s.position.phase_number, Some(1));
        assert_eq!(s.status.as_deref(), Some("Ready to plan"));
        assert_eq!(s.last_activity_note.as_deref(), Some("2026-02-08 — Roadmap created"));
        assert_eq!(s.last_activity, Some(at("2026-02-08")));
        assert_eq!(s.plans_completed, Some(4));
        assert_eq!(s.average_duration.as_deref(), Some("12 min"));
        assert_eq!(s.concerns, vec!["API rate limits unclear", "Auth provider not chosen"]);
        assert_eq!(s.activity_points, 1);
        assert_eq!(s.velocity, None);
    }

    #[test]
    fn concerns_skip_none_placeholder() {
        let s = state("### Blockers/Concerns\n\nNone yet.\n- None\nProgress: 10%\n");
        assert!(s.concerns.is_empty());
    }

    #[test]
    fn velocity_from_dated_entries() {
        let text = "Progress: 50%\n\n## Activity\n\n- 2026-02-01 Plan 01-01 complete\n- 2026-02-03 Plan 01-02 complete\n- 2026-02-06 Plan 02-01 complete\n- 2026-02-08 14:30 Plan 02-02 complete\n";
        let s = state(text);
        assert_eq!(s.activity_points, 4);
        // window (2026-02-01 14:30, 2026-02-08 14:30] holds the last three
        assert_eq!(s.velocity, Some(3.0 / 7.0));
        assert_eq!(
            s.last_activity,
            Some(Utc.from_utc_datetime(
                &NaiveDate::from_ymd_opt(2026, 2, 8).unwrap().and_hms_opt(14, 30, 0).unwrap()
            ))
        );
    }

    #[test]
    fn last_activity_counts_alongside_dated_entries() {
        let s = state("Progress: 20%\nLast activity: 2026-02-08 — Plan 02 complete\n\n- 2026-02-05 Plan 01 complete\n");
        assert_eq!(s.activity_points, 2);
        assert_eq!(s.velocity, Some(2.0 / 7.0));
        assert_eq!(s.last_activity, Some(at("2026-02-08")));

        // the same date on both is one point
        let s = state("Progress: 20%\nLast activity: 2026-02-08\n\n- 2026-02-08 Plan 01 complete\n");
        assert_eq!(s.activity_points, 1);
        assert_eq!(s.velocity, None);
    }

    #[test]
    fn velocity_window_is_configurable() {
        let text = "Progress: 50%\n| 2026-02-01 | a |\n| 2026-02-02 | b |\n| 2026-02-10 | c |\n";
        let opts = ParseOptions { velocity_window_days: 14 };
        let s = parse(text, &opts).value;
        assert_eq!(s.velocity, Some(3.0 / 14.0));
    }

    #[test]
    fn velocity_needs_two_points() {
        assert_eq!(velocity(&[], 7), None);
        assert_eq!(velocity(&[at("2026-01-01")], 7), None);
        assert_eq!(velocity(&[at("2026-01-01"), at("2026-01-02")], 7), Some(2.0 / 7.0));
    }

    #[test]
    fn bad_dates_are_noted() {
        let parsed = parse("Progress: 5%\n- 2026-13-45 impossible\n", &ParseOptions::default());
        assert_eq!(parsed.notes.len(), 1);
        assert_eq!(parsed.notes[0].line, Some(2));
    }

    #[test]
    fn empty_document() {
        let parsed = parse("", &ParseOptions::default());
        assert_eq!(parsed.value.progress_percent, 0);
        assert_eq!(parsed.value.velocity, None);
        assert_eq!(parsed.notes.len(), 1);
    }
}
