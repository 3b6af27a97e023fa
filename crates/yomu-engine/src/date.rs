//! Upload date normalization.
//!
//! Sites print dates either in a fixed format or relative to now ("3 days
//! ago", "yesterday"). Everything is normalized to epoch milliseconds, with
//! `0` meaning unknown.

use chrono::{DateTime, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Unit words in match order. Words are matched by containment, so earlier
/// entries win when one word contains another.
pub const ENGLISH_UNITS: &[(&str, TimeUnit)] = &[
    ("year", TimeUnit::Year),
    ("yr", TimeUnit::Year),
    ("month", TimeUnit::Month),
    ("week", TimeUnit::Week),
    ("wk", TimeUnit::Week),
    ("day", TimeUnit::Day),
    ("hour", TimeUnit::Hour),
    ("hr", TimeUnit::Hour),
    ("min", TimeUnit::Minute),
    ("sec", TimeUnit::Second),
];

#[derive(Debug, Clone)]
pub struct DateParser {
    formats: Vec<String>,
    units: Vec<(String, TimeUnit)>,
    today: Vec<String>,
    yesterday: Vec<String>,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl DateParser {
    /// `formats` are chrono format strings tried in order.
    pub fn new(formats: &[&str]) -> Self {
        Self {
            formats: formats.iter().map(|f| f.to_string()).collect(),
            units: ENGLISH_UNITS
                .iter()
                .map(|(word, unit)| (word.to_string(), *unit))
                .collect(),
            today: vec!["today".to_string()],
            yesterday: vec!["yesterday".to_string()],
        }
    }

    /// Replaces the unit table, for sites not written in English.
    pub fn with_units(mut self, units: &[(&str, TimeUnit)]) -> Self {
        self.units = units
            .iter()
            .map(|(word, unit)| (word.to_lowercase(), *unit))
            .collect();
        self
    }

    pub fn with_day_words(mut self, today: &[&str], yesterday: &[&str]) -> Self {
        self.today = today.iter().map(|w| w.to_lowercase()).collect();
        self.yesterday = yesterday.iter().map(|w| w.to_lowercase()).collect();
        self
    }

    pub fn parse(&self, date: &str) -> i64 {
        self.parse_at(date, Utc::now())
    }

    pub fn parse_at(&self, date: &str, now: DateTime<Utc>) -> i64 {
        let date = date.trim();
        if date.is_empty() {
            return 0;
        }

        self.parse_day_word(date, now)
            .or_else(|| self.parse_relative(date, now))
            .or_else(|| self.parse_absolute(date))
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    fn parse_day_word(&self, date: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lower = date.to_lowercase();
        let (day, rest) = if let Some(word) = self.today.iter().find(|w| lower.starts_with(w.as_str())) {
            (now, &lower[word.len()..])
        } else if let Some(word) = self.yesterday.iter().find(|w| lower.starts_with(w.as_str())) {
            (now.checked_sub_days(Days::new(1))?, &lower[word.len()..])
        } else {
            return None;
        };

        let rest = rest.trim_start_matches([',', ' ']).trim();
        if rest.is_empty() {
            return Some(day);
        }

        // "today 10:30 pm" keeps the printed time of day
        ["%I:%M %p", "%H:%M"]
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(rest, f).ok())
            .map(|time| day.date_naive().and_time(time).and_utc())
            .or(Some(day))
    }

    fn parse_relative(&self, date: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lower = date.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        // the count is the first numeric token, "hace 2 días" puts a word first
        let (index, count) = tokens.iter().enumerate().find_map(|(i, token)| match *token {
            "a" | "an" | "one" if i == 0 => Some((i, 1)),
            token => token
                .trim_end_matches(|c: char| !c.is_ascii_digit())
                .parse::<u32>()
                .ok()
                .map(|count| (i, count)),
        })?;

        // unit words are only looked for from the count on, so weekday names
        // in absolute dates are not read as days
        let rest = tokens[index..].join(" ");
        let unit = self
            .units
            .iter()
            .find(|(word, _)| rest.contains(word.as_str()))
            .map(|(_, unit)| *unit)?;

        match unit {
            TimeUnit::Second => now.checked_sub_signed(Duration::seconds(count.into())),
            TimeUnit::Minute => now.checked_sub_signed(Duration::minutes(count.into())),
            TimeUnit::Hour => now.checked_sub_signed(Duration::hours(count.into())),
            TimeUnit::Day => now.checked_sub_days(Days::new(count.into())),
            TimeUnit::Week => now.checked_sub_days(Days::new(u64::from(count) * 7)),
            TimeUnit::Month => now.checked_sub_months(Months::new(count)),
            TimeUnit::Year => now.checked_sub_months(Months::new(count.checked_mul(12)?)),
        }
    }

    fn parse_absolute(&self, date: &str) -> Option<DateTime<Utc>> {
        self.formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(date, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(date, format)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|dt| dt.and_utc())
        })
    }
}
