use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// The six fixed academic half-term buckets. A closed enumeration; never
/// persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalfTerm {
    A1,
    A2,
    #[serde(rename = "SP1")]
    Sp1,
    #[serde(rename = "SP2")]
    Sp2,
    #[serde(rename = "SM1")]
    Sm1,
    #[serde(rename = "SM2")]
    Sm2,
}

pub const ALL_HALF_TERMS: [HalfTerm; 6] = [
    HalfTerm::A1,
    HalfTerm::A2,
    HalfTerm::Sp1,
    HalfTerm::Sp2,
    HalfTerm::Sm1,
    HalfTerm::Sm2,
];

impl HalfTerm {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A1" => Some(Self::A1),
            "A2" => Some(Self::A2),
            "SP1" => Some(Self::Sp1),
            "SP2" => Some(Self::Sp2),
            "SM1" => Some(Self::Sm1),
            "SM2" => Some(Self::Sm2),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::A1 => "Autumn 1",
            Self::A2 => "Autumn 2",
            Self::Sp1 => "Spring 1",
            Self::Sp2 => "Spring 2",
            Self::Sm1 => "Summer 1",
            Self::Sm2 => "Summer 2",
        }
    }

    /// Calendar months covered by the bucket (inclusive).
    pub fn months(self) -> (u32, u32) {
        match self {
            Self::A1 => (9, 10),
            Self::A2 => (11, 12),
            Self::Sp1 => (1, 2),
            Self::Sp2 => (3, 4),
            Self::Sm1 => (5, 6),
            Self::Sm2 => (7, 8),
        }
    }

    /// Fixed scheme-of-work mapping: six lessons per half term, 1..=36.
    pub fn lesson_numbers(self) -> impl Iterator<Item = String> {
        let start = match self {
            Self::A1 => 1,
            Self::A2 => 7,
            Self::Sp1 => 13,
            Self::Sp2 => 19,
            Self::Sm1 => 25,
            Self::Sm2 => 31,
        };
        (start..start + 6).map(|n: i64| n.to_string())
    }
}

pub fn half_term_for_lesson(number: &str) -> Option<HalfTerm> {
    let n: i64 = number.trim().parse().ok()?;
    match n {
        1..=6 => Some(HalfTerm::A1),
        7..=12 => Some(HalfTerm::A2),
        13..=18 => Some(HalfTerm::Sp1),
        19..=24 => Some(HalfTerm::Sp2),
        25..=30 => Some(HalfTerm::Sm1),
        31..=36 => Some(HalfTerm::Sm2),
        _ => None,
    }
}

pub fn half_term_for_date(date: NaiveDate) -> HalfTerm {
    let month = date.month();
    ALL_HALF_TERMS
        .iter()
        .copied()
        .find(|t| {
            let (a, b) = t.months();
            month == a || month == b
        })
        .unwrap_or(HalfTerm::A1)
}

/// Calendar day of a stored date string, dropping any time-of-day suffix.
pub fn date_part(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.split_once('T') {
        Some((day, _)) => day,
        None => trimmed,
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_part(raw), "%Y-%m-%d").ok()
}

/// Week-of-year used to stamp plans: ceil of whole days since Jan 1 over 7.
pub fn week_number(date: NaiveDate) -> i64 {
    let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("jan 1 exists");
    let days = (date - jan1).num_days();
    (days + 6) / 7
}

/// String-input convenience for plan creation; unparseable dates stamp
/// week 0 rather than failing the create.
pub fn week_number_str(raw: &str) -> i64 {
    parse_date(raw).map(week_number).unwrap_or(0)
}

pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Month-view cells: leading days from the previous month, the month itself,
/// trailing days from the next month, so the grid is always whole weeks.
/// Weeks start on Monday.
pub fn month_grid(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let leading = first.weekday().num_days_from_monday() as i64;
    let start = first - Duration::days(leading);

    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let days_in_month = (next_month_first - first).num_days();
    let used = leading + days_in_month;
    let total = ((used + 6) / 7) * 7;

    Some((0..total).map(|i| start + Duration::days(i)).collect())
}
