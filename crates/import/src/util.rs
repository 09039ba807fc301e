use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;

pub(crate) fn trim_cell(text: &str) -> String {
    text.trim().trim_start_matches('\u{feff}').trim().to_string()
}

/// Lower-cases, drops whitespace and punctuation, and folds common accents so
/// "Date d'opération" and "dateOperation" compare equal.
pub(crate) fn normalize_key(key: &str) -> String {
    trim_cell(key)
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'à' | 'â' | 'ä' => Some('a'),
            'é' | 'è' | 'ê' | 'ë' => Some('e'),
            'î' | 'ï' => Some('i'),
            'ô' | 'ö' => Some('o'),
            'ù' | 'û' | 'ü' => Some('u'),
            'ç' => Some('c'),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Parses an amount written with either `,` or `.` as decimal separator and
/// optional thousands separators, spaces, currency marks, a leading sign or
/// accounting parentheses.
pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    let (paren_negative, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    let mut s: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '£' | '\'' | '\u{a0}' | '\u{202f}'))
        .collect();
    for code in ["EUR", "eur", "USD", "GBP"] {
        s = s.replace(code, "");
    }
    if s.is_empty() {
        return None;
    }

    let (sign, body) = match s.as_bytes()[0] {
        b'-' => (-1, &s[1..]),
        b'+' => (1, &s[1..]),
        _ => match s.strip_suffix('-') {
            Some(rest) => (-1, rest),
            None => (1, s.as_str()),
        },
    };
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let canonical = canonical_number(body)?;
    let mut value = Decimal::from_str(&canonical).ok()?;
    if value > max_amount() {
        return None;
    }
    if sign < 0 || paren_negative {
        value = -value;
    }
    Some(value)
}

/// Largest magnitude whose cent count still fits an `i64`.
fn max_amount() -> Decimal {
    Decimal::from(i64::MAX / 100)
}

/// Resolves which of `,` / `.` is the decimal separator and returns the
/// number with `.` as the only separator.
fn canonical_number(body: &str) -> Option<String> {
    let last_comma = body.rfind(',');
    let last_dot = body.rfind('.');
    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    let decimal_sep = match (last_comma, last_dot) {
        (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
        (Some(c), None) => {
            // "1,234" with exactly three trailing digits reads as thousands.
            let trailing = body.len() - c - 1;
            (commas == 1 && trailing != 3).then_some(',')
        }
        (None, Some(_)) => (dots == 1).then_some('.'),
        (None, None) => None,
    };

    let mut out = String::with_capacity(body.len());
    let mut seen_decimal = false;
    for c in body.chars() {
        match c {
            c if c.is_ascii_digit() => out.push(c),
            c if Some(c) == decimal_sep => {
                if seen_decimal {
                    return None;
                }
                seen_decimal = true;
                out.push('.');
            }
            _ => {}
        }
    }
    if out.is_empty() || out == "." {
        return None;
    }
    Some(out)
}

// Two-digit-year formats come first: chrono's `%Y` would read "25" as year 25.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y", "%d-%m-%y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d",
    "%Y%m%d",
];

// Serial 2_958_465 is 9999-12-31, the last date spreadsheets can display.
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

/// Parses day-first and ISO dates; a bare number is read as a spreadsheet
/// serial day count from 1899-12-30.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = trim_cell(raw);
    if text.is_empty() {
        return None;
    }
    let first_token = text.split([' ', 'T']).next().unwrap_or_default();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(first_token, fmt) {
            return Some(date);
        }
    }

    let serial = text.parse::<f64>().ok()?;
    if !SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn amount_point_decimal() {
        assert_eq!(parse_amount("123.45"), Some(dec("123.45")));
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
    }

    #[test]
    fn amount_comma_decimal() {
        assert_eq!(parse_amount("-12,50"), Some(dec("-12.50")));
        assert_eq!(parse_amount("1 234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1\u{a0}234,5 €"), Some(dec("1234.5")));
    }

    #[test]
    fn amount_thousands_only() {
        assert_eq!(parse_amount("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount("1.234.567"), Some(dec("1234567")));
    }

    #[test]
    fn amount_signs() {
        assert_eq!(parse_amount("+40,00"), Some(dec("40.00")));
        assert_eq!(parse_amount("(75.25)"), Some(dec("-75.25")));
        assert_eq!(parse_amount("12,50-"), Some(dec("-12.50")));
    }

    #[test]
    fn amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("12a"), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("1,2,3.4.5"), None);
    }

    #[test]
    fn amount_rejects_magnitudes_beyond_cents() {
        assert_eq!(parse_amount("50000000000000000000000000000"), None);
        assert_eq!(parse_amount("-92233720368547758,08"), None);
        assert_eq!(parse_amount("92233720368547758"), Some(dec("92233720368547758")));
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn date_day_first_and_iso() {
        let d = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        assert_eq!(parse_date("2025-02-03"), Some(d));
        assert_eq!(parse_date("03/02/2025"), Some(d));
        assert_eq!(parse_date("03/02/25"), Some(d));
        assert_eq!(parse_date("03.02.2025"), Some(d));
        assert_eq!(parse_date("2025-02-03 00:00:00"), Some(d));
    }

    #[test]
    fn date_spreadsheet_serial() {
        assert_eq!(parse_date("45658"), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(parse_date("2958465"), NaiveDate::from_ymd_opt(9999, 12, 31));
    }

    #[test]
    fn date_serial_out_of_range_is_none() {
        assert_eq!(parse_date("1e300"), None);
        assert_eq!(parse_date("2958466"), None);
        assert_eq!(parse_date("0.5"), None);
        assert_eq!(parse_date("NaN"), None);
    }

    #[test]
    fn date_compact_year_first() {
        assert_eq!(parse_date("20250102"), NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(parse_date("20251340"), None);
    }

    #[test]
    fn date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date("31/02/2025"), None);
    }

    // ── normalize_key ─────────────────────────────────────────────────────────

    #[test]
    fn keys_fold_accents_and_punctuation() {
        assert_eq!(normalize_key("Date d'opération"), "datedoperation");
        assert_eq!(normalize_key("\u{feff}dateOp"), "dateop");
        assert_eq!(normalize_key("Libellé"), "libelle");
    }
}
