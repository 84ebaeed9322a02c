//! `date`: any accepted day/month/year spelling becomes `MM/YYYY`.

use super::clean_line;
use crate::registry::Context;
use crate::{Formatted, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
enum Year {
    Full,
    Short,
}

struct DatePattern {
    re: Regex,
    has_day: bool,
    year: Year,
}

/// Tried in order; the first pattern that yields a valid calendar date wins.
fn patterns() -> &'static [DatePattern] {
    static PATTERNS: OnceLock<Vec<DatePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$", true, Year::Full),
            (r"^(\d{1,2})/(\d{1,2})/(\d{4})$", true, Year::Full),
            (r"^(\d{1,2})/(\d{4})$", false, Year::Full),
            (r"^(\d{1,2})\.(\d{1,2})\.(\d{2})$", true, Year::Short),
            (r"^(\d{1,2})/(\d{1,2})/(\d{2})$", true, Year::Short),
            (r"^(\d{1,2})/(\d{2})$", false, Year::Short),
        ]
        .into_iter()
        .map(|(re, has_day, year)| DatePattern {
            re: Regex::new(re).expect("valid regex"),
            has_day,
            year,
        })
        .collect()
    })
}

/// Two-digit years follow the POSIX pivot: 69..=99 are 19xx, the rest 20xx.
fn expand_year(year: i32, kind: Year) -> i32 {
    match kind {
        Year::Full => year,
        Year::Short if year >= 69 => 1900 + year,
        Year::Short => 2000 + year,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    patterns().iter().find_map(|p| {
        let caps = p.re.captures(text)?;
        let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
        let (day, month, year) = if p.has_day {
            (num(1)?, num(2)?, num(3)?)
        } else {
            (1, num(1)?, num(2)?)
        };
        let year = expand_year(i32::try_from(year).ok()?, p.year);
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

pub fn format_date(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let cleaned = clean_line(value, ctx);
    if cleaned.is_empty() {
        return Ok(Formatted::compare(value, cleaned));
    }
    let Some(date) = parse_date(&cleaned) else {
        ctx.reporter.critical(&format!("Unknown date format: {value}"));
        return Ok(Formatted::unchanged(value));
    };
    Ok(Formatted::compare(value, date.format("%m/%Y").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::testing::{Harness, check};

    #[test]
    fn accepted_spellings() {
        let h = Harness::new();
        let ctx = h.ctx(false);
        let cases = [
            ("", ""),
            ("3.6.24", "06/2024"),
            ("3/6/24", "06/2024"),
            ("6/24", "06/2024"),
            ("3.6.2024", "06/2024"),
            ("3/6/2024", "06/2024"),
            ("6/2024", "06/2024"),
            ("  12.11.1999 ", "11/1999"),
            ("1.1.70", "01/1970"),
        ];
        for (input, expected) in cases {
            check(format_date, &ctx, input, expected);
        }
        assert_eq!(h.criticals(), 0);
    }

    #[test]
    fn impossible_dates_are_reported() {
        let h = Harness::new();
        let ctx = h.ctx(false);
        for input in ["31.2.2024", "13/2024", "yesterday", "3.6"] {
            let out = format_date(input, &ctx).unwrap();
            assert_eq!(out, Formatted::unchanged(input));
        }
        assert_eq!(h.criticals(), 4);
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        let h = Harness::new();
        let out = format_date(" \u{feff}", &h.ctx(false)).unwrap();
        assert_eq!(out.value, "");
        assert!(out.changed);
    }
}
