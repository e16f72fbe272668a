//! Frequency codes and period parsing.
//!
//! Period parsers are strict: a value is accepted only when rendering the
//! parsed timestamp with the matching pattern gives back the exact input.
//! Anything else yields `None` so decoders can keep the observation and move
//! on.

use time::{Date, Month, PrimitiveDateTime, Time, Weekday};

use crate::domain::Frequency;

/// Maps an SDMX frequency code (`A`, `M`, `M2`, ...) to a [`Frequency`].
///
/// A numeric multiplier after the letter is ignored, except that annual codes
/// with a multiplier of 0 or 1 (`A0`, `A1`) are treated as undefined.
pub fn parse_frequency(code: &str) -> Frequency {
    let mut chars = code.chars();
    let Some(letter) = chars.next() else {
        return Frequency::Undefined;
    };
    let suffix = chars.as_str();
    if suffix.is_empty() {
        return Frequency::from_code(letter);
    }

    match digits(suffix) {
        Some(multiplier) if letter == 'A' && multiplier <= 1 => Frequency::Undefined,
        Some(_) => Frequency::from_code(letter),
        None => Frequency::Undefined,
    }
}

/// Maps an SDMX 2.0 `TIME_FORMAT` duration to a [`Frequency`].
pub fn parse_time_format(code: &str) -> Frequency {
    match code {
        "P1Y" => Frequency::Annual,
        "P6M" => Frequency::HalfYearly,
        "P3M" => Frequency::Quarterly,
        "P1M" => Frequency::Monthly,
        "P7D" => Frequency::Weekly,
        "P1D" => Frequency::Daily,
        "PT1H" => Frequency::Hourly,
        "PT1M" => Frequency::Minutely,
        _ => Frequency::Undefined,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    /// `yyyy`
    Year,
    /// `yyyy-MM`, month aligned on a period of `step` months.
    Month { step: u8 },
    /// `yyyy-MM-dd`
    Day,
    /// `yyyy-MM-ddTHH:mm`
    Minute,
    /// `yyyy-MM-ddTHH:mm:ss`
    Second,
    /// `yyyy-X#` or `yyyyX#`, with `#` in `1..=per_year`.
    Position { letter: char, per_year: u8 },
    /// `yyyy-W##` or `yyyyW##`, ISO week starting on Monday.
    Week,
}

const ANNUAL: &[Pattern] = &[
    Pattern::Year,
    Pattern::Month { step: 12 },
    Pattern::Position {
        letter: 'A',
        per_year: 1,
    },
];
const HALF_YEARLY: &[Pattern] = &[
    Pattern::Month { step: 6 },
    Pattern::Position {
        letter: 'S',
        per_year: 2,
    },
];
const QUARTERLY: &[Pattern] = &[
    Pattern::Month { step: 3 },
    Pattern::Position {
        letter: 'Q',
        per_year: 4,
    },
];
const MONTHLY: &[Pattern] = &[
    Pattern::Month { step: 1 },
    Pattern::Position {
        letter: 'M',
        per_year: 12,
    },
];
const WEEKLY: &[Pattern] = &[Pattern::Day, Pattern::Week];
const DAILY: &[Pattern] = &[Pattern::Day];
const INTRADAY: &[Pattern] = &[Pattern::Second, Pattern::Minute, Pattern::Day];
const UNDEFINED: &[Pattern] = &[
    Pattern::Year,
    Pattern::Month { step: 1 },
    Pattern::Day,
    Pattern::Second,
    Pattern::Minute,
];

/// Frequency-specific period parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodParser {
    frequency: Frequency,
    patterns: &'static [Pattern],
}

impl PeriodParser {
    pub const fn new(frequency: Frequency) -> Self {
        let patterns = match frequency {
            Frequency::Annual => ANNUAL,
            Frequency::HalfYearly => HALF_YEARLY,
            Frequency::Quarterly => QUARTERLY,
            Frequency::Monthly => MONTHLY,
            Frequency::Weekly => WEEKLY,
            Frequency::Daily | Frequency::DailyBusiness => DAILY,
            Frequency::Hourly | Frequency::Minutely => INTRADAY,
            Frequency::Undefined => UNDEFINED,
        };
        Self {
            frequency,
            patterns,
        }
    }

    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Start of the period denoted by `text`, or `None` when no pattern
    /// round-trips.
    pub fn parse(&self, text: &str) -> Option<PrimitiveDateTime> {
        self.patterns
            .iter()
            .find_map(|pattern| parse_with(*pattern, text))
    }
}

fn parse_with(pattern: Pattern, text: &str) -> Option<PrimitiveDateTime> {
    let (value, rendered) = match pattern {
        Pattern::Year => {
            let year = year(text)?;
            (at_midnight(calendar_date(year, 1, 1)?), format!("{year:04}"))
        }
        Pattern::Month { step } => {
            let (year_text, month_text) = text.split_once('-')?;
            let year = year(year_text)?;
            let month = digits(month_text)?;
            if month == 0 || (month - 1) % u32::from(step) != 0 {
                return None;
            }
            (
                at_midnight(calendar_date(year, month, 1)?),
                format!("{year:04}-{month:02}"),
            )
        }
        Pattern::Day => {
            let (date, rendered) = day(text)?;
            (at_midnight(date), rendered)
        }
        Pattern::Minute | Pattern::Second => {
            let (date_text, time_text) = text.split_once('T')?;
            let (date, date_rendered) = day(date_text)?;
            let parts = time_text
                .split(':')
                .map(digits)
                .collect::<Option<Vec<_>>>()?;
            let (hour, minute, second, rendered) = match (pattern, parts.as_slice()) {
                (Pattern::Minute, [hour, minute]) => (
                    *hour,
                    *minute,
                    0,
                    format!("{date_rendered}T{hour:02}:{minute:02}"),
                ),
                (Pattern::Second, [hour, minute, second]) => (
                    *hour,
                    *minute,
                    *second,
                    format!("{date_rendered}T{hour:02}:{minute:02}:{second:02}"),
                ),
                _ => return None,
            };
            let time = Time::from_hms(
                u8::try_from(hour).ok()?,
                u8::try_from(minute).ok()?,
                u8::try_from(second).ok()?,
            )
            .ok()?;
            (PrimitiveDateTime::new(date, time), rendered)
        }
        Pattern::Position { letter, per_year } => {
            let (year, separator, position) = positional(text, letter)?;
            if position == 0 || position > u32::from(per_year) {
                return None;
            }
            let month = (position - 1) * (12 / u32::from(per_year)) + 1;
            (
                at_midnight(calendar_date(year, month, 1)?),
                format!("{year:04}{separator}{letter}{position}"),
            )
        }
        Pattern::Week => {
            let (year, separator, week) = positional(text, 'W')?;
            let week = u8::try_from(week).ok()?;
            let date = Date::from_iso_week_date(year, week, Weekday::Monday).ok()?;
            (at_midnight(date), format!("{year:04}{separator}W{week:02}"))
        }
    };

    (rendered == text).then_some(value)
}

/// Splits `yyyy-X#` / `yyyyX#` into year, separator and position number.
fn positional(text: &str, letter: char) -> Option<(i32, &'static str, u32)> {
    let year = year(text.get(..4)?)?;
    let rest = text.get(4..)?;
    let (separator, rest) = match rest.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rest),
    };
    let position = digits(rest.strip_prefix(letter)?)?;
    Some((year, separator, position))
}

fn day(text: &str) -> Option<(Date, String)> {
    let mut parts = text.splitn(3, '-');
    let year = year(parts.next()?)?;
    let month = digits(parts.next()?)?;
    let day = digits(parts.next()?)?;
    let date = calendar_date(year, month, day)?;
    Some((date, format!("{year:04}-{month:02}-{day:02}")))
}

fn year(text: &str) -> Option<i32> {
    if text.len() != 4 {
        return None;
    }
    digits(text).and_then(|year| i32::try_from(year).ok())
}

fn digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn calendar_date(year: i32, month: u32, day: u32) -> Option<Date> {
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

const fn at_midnight(date: Date) -> PrimitiveDateTime {
    PrimitiveDateTime::new(date, Time::MIDNIGHT)
}
