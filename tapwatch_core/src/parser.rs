//! Raw OCR text to a numeric value.
//!
//! The first numeric token in the text wins. Thousands grouping, a decimal
//! separator, and a magnitude suffix are recognised per [`FormatHints`];
//! the result is checked against the field's [`ValueDomain`].

use crate::error::ParseFailure;

/// How numbers are written on screen for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatHints {
    pub decimal_separator: char,
    /// `None` disables grouping: a separator then ends the token.
    pub thousands_separator: Option<char>,
    /// Magnitude suffixes, matched case-insensitively.
    pub suffixes: Vec<(String, f64)>,
    /// Map letters OCR commonly confuses with digits (`O`, `l`, `S`, ...)
    /// when they sit between digits.
    pub repair_confusables: bool,
}

impl Default for FormatHints {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: Some(','),
            suffixes: vec![
                ("K".to_string(), 1e3),
                ("M".to_string(), 1e6),
                ("B".to_string(), 1e9),
                ("T".to_string(), 1e12),
            ],
            repair_confusables: true,
        }
    }
}

/// Range and kind of values a field may hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueDomain {
    pub min: f64,
    pub max: Option<f64>,
    pub integer: bool,
}

impl Default for ValueDomain {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: None,
            integer: true,
        }
    }
}

impl ValueDomain {
    /// Non-negative reals.
    pub fn decimal() -> Self {
        Self {
            integer: false,
            ..Self::default()
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && value >= self.min
            && self.max.is_none_or(|max| value <= max)
            && (!self.integer || value.fract() == 0.0)
    }
}

/// Parse `raw` into a value inside `domain`.
///
/// Pure; never panics on arbitrary input.
pub fn parse(raw: &str, hints: &FormatHints, domain: &ValueDomain) -> Result<f64, ParseFailure> {
    let mut chars: Vec<char> = raw.chars().collect();
    if hints.repair_confusables {
        repair_confusables(&mut chars, hints);
    }
    let Some(first_digit) = chars.iter().position(char::is_ascii_digit) else {
        return Err(ParseFailure::Empty);
    };

    let dec = hints.decimal_separator;
    let mut begin = first_digit;
    if begin > 0 && chars[begin - 1] == dec {
        begin -= 1;
    }
    let negative = begin > 0 && chars[begin - 1] == '-';

    let mut end = begin;
    while end < chars.len() {
        let c = chars[end];
        let next_is_digit = chars.get(end + 1).is_some_and(char::is_ascii_digit);
        if c.is_ascii_digit() || (c == dec && next_is_digit) {
            end += 1;
        } else if Some(c) == hints.thousands_separator && next_is_digit {
            end += 1;
        } else {
            break;
        }
    }

    let number = assemble(&chars[begin..end], hints)?;
    let (multiplier, has_suffix) = match match_suffix(&chars[end..], &hints.suffixes) {
        Some(m) => (m, true),
        None => (1.0, false),
    };

    if domain.integer && number.has_fraction && !has_suffix {
        return Err(ParseFailure::NonNumeric);
    }

    let mut value = number.value * multiplier;
    if domain.integer {
        value = value.round();
    }
    if negative {
        value = -value;
    }
    if !domain.contains(value) {
        return Err(ParseFailure::OutOfDomain);
    }
    Ok(value)
}

struct Number {
    value: f64,
    has_fraction: bool,
}

/// Validate grouping and build the value of one numeric token.
fn assemble(token: &[char], hints: &FormatHints) -> Result<Number, ParseFailure> {
    let dec = hints.decimal_separator;
    let mut parts = token.split(|&c| c == dec);
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(ParseFailure::NonNumeric);
    }

    let mut digits = String::with_capacity(token.len() + 1);
    match hints.thousands_separator {
        Some(sep) if int_part.contains(&sep) => {
            for (i, group) in int_part.split(|&c| c == sep).enumerate() {
                let ok = if i == 0 {
                    (1..=3).contains(&group.len())
                } else {
                    group.len() == 3
                };
                if !ok {
                    return Err(ParseFailure::NonNumeric);
                }
                digits.extend(group);
            }
        }
        _ => digits.extend(int_part),
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) || !frac_part.iter().all(char::is_ascii_digit)
    {
        return Err(ParseFailure::NonNumeric);
    }

    let has_fraction = frac_part.iter().any(|&c| c != '0');
    if !frac_part.is_empty() {
        digits.push('.');
        digits.extend(frac_part);
    }
    let value = digits
        .parse::<f64>()
        .map_err(|_| ParseFailure::NonNumeric)?;
    Ok(Number {
        value,
        has_fraction,
    })
}

/// Match a suffix right after the token, allowing spaces in between. A
/// suffix followed by another letter is part of a word, not a magnitude.
fn match_suffix(rest: &[char], suffixes: &[(String, f64)]) -> Option<f64> {
    let start = rest.iter().position(|c| *c != ' ')?;
    let rest = &rest[start..];
    let mut best: Option<(usize, f64)> = None;
    for (suffix, mult) in suffixes {
        let len = suffix.chars().count();
        if len == 0 || len > rest.len() {
            continue;
        }
        let matches = rest[..len]
            .iter()
            .zip(suffix.chars())
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()));
        let followed_by_letter = rest.get(len).is_some_and(|c| c.is_alphabetic());
        if matches && !followed_by_letter && best.is_none_or(|(l, _)| len > l) {
            best = Some((len, *mult));
        }
    }
    best.map(|(_, m)| m)
}

fn confusable_digit(c: char) -> Option<char> {
    match c {
        'O' | 'o' => Some('0'),
        'I' | 'l' | '|' => Some('1'),
        'Z' | 'z' => Some('2'),
        'S' | 's' => Some('5'),
        _ => None,
    }
}

/// Replace runs of confusable letters that are enclosed by digits (possibly
/// across a single separator on either side).
fn repair_confusables(chars: &mut [char], hints: &FormatHints) {
    let is_sep =
        |c: char| c == hints.decimal_separator || Some(c) == hints.thousands_separator;
    let digit_before = |chars: &[char], i: usize| -> bool {
        match i.checked_sub(1).map(|j| chars[j]) {
            Some(c) if c.is_ascii_digit() => true,
            Some(c) if is_sep(c) => i >= 2 && chars[i - 2].is_ascii_digit(),
            _ => false,
        }
    };
    let digit_after = |chars: &[char], j: usize| -> bool {
        match chars.get(j) {
            Some(c) if c.is_ascii_digit() => true,
            Some(&c) if is_sep(c) => chars.get(j + 1).is_some_and(char::is_ascii_digit),
            _ => false,
        }
    };

    let mut i = 0;
    while i < chars.len() {
        if confusable_digit(chars[i]).is_none() || !digit_before(chars, i) {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < chars.len() && confusable_digit(chars[j]).is_some() {
            j += 1;
        }
        if digit_after(chars, j) {
            for c in &mut chars[i..j] {
                if let Some(d) = confusable_digit(*c) {
                    *c = d;
                }
            }
        }
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn int() -> ValueDomain {
        ValueDomain::default()
    }

    #[rstest]
    #[case("1,234", 1234.0)]
    #[case("Gold: 12,345,678", 12_345_678.0)]
    #[case("1.5K", 1500.0)]
    #[case("2.25m", 2_250_000.0)]
    #[case("3 B", 3e9)]
    #[case("  42  ", 42.0)]
    #[case("1O5", 105.0)]
    #[case("1,O00", 1000.0)]
    #[case("7 Kills", 7.0)]
    #[case("12 34", 12.0)]
    #[case("1234.", 1234.0)]
    #[case("1234.00", 1234.0)]
    fn parses_integer_readings(#[case] raw: &str, #[case] expected: f64) {
        assert_eq!(parse(raw, &FormatHints::default(), &int()), Ok(expected));
    }

    #[rstest]
    #[case("", ParseFailure::Empty)]
    #[case("   ", ParseFailure::Empty)]
    #[case("abc", ParseFailure::Empty)]
    #[case("1,23", ParseFailure::NonNumeric)]
    #[case("12,3456", ParseFailure::NonNumeric)]
    #[case("12.5", ParseFailure::NonNumeric)]
    #[case("1.2.3", ParseFailure::NonNumeric)]
    #[case("-5", ParseFailure::OutOfDomain)]
    fn rejects_bad_integer_readings(#[case] raw: &str, #[case] expected: ParseFailure) {
        assert_eq!(parse(raw, &FormatHints::default(), &int()), Err(expected));
    }

    #[test]
    fn decimal_domain_keeps_fraction() {
        let d = ValueDomain::decimal();
        assert_eq!(parse("12.5", &FormatHints::default(), &d), Ok(12.5));
        assert_eq!(parse(".5", &FormatHints::default(), &d), Ok(0.5));
    }

    #[test]
    fn european_format() {
        let hints = FormatHints {
            decimal_separator: ',',
            thousands_separator: Some('.'),
            ..FormatHints::default()
        };
        assert_eq!(parse("1.234.567", &hints, &int()), Ok(1_234_567.0));
        assert_eq!(parse("2,5K", &hints, &int()), Ok(2500.0));
    }

    #[test]
    fn disabled_grouping_ends_token_at_separator() {
        let hints = FormatHints {
            thousands_separator: None,
            ..FormatHints::default()
        };
        assert_eq!(parse("1,234", &hints, &int()), Ok(1.0));
    }

    #[test]
    fn max_bound_is_enforced() {
        let d = ValueDomain {
            max: Some(100.0),
            ..ValueDomain::default()
        };
        assert_eq!(parse("100", &FormatHints::default(), &d), Ok(100.0));
        assert_eq!(
            parse("101", &FormatHints::default(), &d),
            Err(ParseFailure::OutOfDomain)
        );
    }

    #[test]
    fn repair_can_be_disabled() {
        let hints = FormatHints {
            repair_confusables: false,
            ..FormatHints::default()
        };
        assert_eq!(parse("1O5", &hints, &int()), Ok(1.0));
    }

    #[test]
    fn longest_suffix_wins() {
        let hints = FormatHints {
            suffixes: vec![("M".to_string(), 1e6), ("Mi".to_string(), 1_048_576.0)],
            ..FormatHints::default()
        };
        assert_eq!(parse("2Mi", &hints, &int()), Ok(2_097_152.0));
    }
}
