//! Best-effort cell coercion.
//!
//! Every function here returns `None` for text it cannot read. A bad cell is
//! expected dirty data and never fails the row or the batch.

use chrono::NaiveDate;
use positions_core::{DateOrder, DatePolicy, DeliveryMonth};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Two-digit years below this pivot are 20xx, the rest 19xx.
const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

/// Parse a decimal, ignoring thousands separators.
///
/// Accepts plain (`-1,250.50`, `+3`) and scientific (`1.5e3`) notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(cleaned.as_str());
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
}

/// Parse a four digit `YYMM` delivery code.
pub fn parse_delivery_code(text: &str) -> Option<DeliveryMonth> {
    DeliveryMonth::from_yymm(text.trim())
}

/// Parse a date using the policy's primary order, then its fallback.
pub fn parse_date(text: &str, policy: &DatePolicy) -> Option<NaiveDate> {
    policy.orders().find_map(|order| parse_date_with_order(text, order))
}

/// Parse a date reading ambiguous numeric parts in the given order.
///
/// ISO `YYYY-MM-DD` and textual months (`25-Apr-2025`, `Apr 25 2025`) are
/// read the same way in either order. A trailing time of day is ignored.
pub fn parse_date_with_order(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let text = strip_time(text.trim());
    let parts: Vec<&str> = text
        .split(|c: char| c == '/' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };

    if let Some(month) = month_from_name(b) {
        return ymd(year(c)?, month, day(a)?);
    }
    if let Some(month) = month_from_name(a) {
        return ymd(year(c)?, month, day(b)?);
    }
    if a.len() == 4 {
        return ymd(year(a)?, number(b, 2)?, day(c)?);
    }

    let (d, m) = match order {
        DateOrder::DayFirst => (a, b),
        DateOrder::MonthFirst => (b, a),
    };
    ymd(year(c)?, number(m, 2)?, day(d)?)
}

/// Drop a time-of-day suffix such as ` 00:00:00` or `T09:30`.
fn strip_time(text: &str) -> &str {
    let Some(colon) = text.find(':') else {
        return text;
    };
    match text[..colon].rfind(|c: char| c == 'T' || c.is_whitespace()) {
        Some(cut) => text[..cut].trim_end(),
        None => text,
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn number(part: &str, max_len: usize) -> Option<u32> {
    if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn day(part: &str) -> Option<u32> {
    number(part, 2)
}

fn year(part: &str) -> Option<i32> {
    match part.len() {
        2 => {
            let yy = number(part, 2)? as i32;
            Some(if yy < TWO_DIGIT_YEAR_PIVOT { 2000 + yy } else { 1900 + yy })
        }
        4 => number(part, 4).map(|y| y as i32),
        _ => None,
    }
}

/// Month from a three-letter abbreviation or a full English name.
fn month_from_name(part: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    if part.len() < 3 || !part.is_ascii() {
        return None;
    }
    let name = part.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name || m[..3] == name)
        .map(|i| i as u32 + 1)
}
