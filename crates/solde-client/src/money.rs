//! Fixed-point amounts. Every amount in the store is an `i64` count of minor
//! units; bank text is converted here and nowhere else.

/// Largest accepted magnitude (10^13 units). Store-wide sums of capped
/// amounts stay inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

const CURRENCY_SYMBOLS: [char; 3] = ['€', '$', '£'];
const GROUPING_SPACES: [char; 3] = [' ', '\u{a0}', '\u{202f}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    Empty,
    /// Separator usage that could be read as either decimal or grouping.
    AmbiguousSeparator,
    TooManyDecimals,
    Invalid,
    Overflow,
}

impl AmountError {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Empty => "missing_amount",
            Self::AmbiguousSeparator => "ambiguous_amount",
            Self::TooManyDecimals => "invalid_amount_scale",
            Self::Invalid => "invalid_amount",
            Self::Overflow => "amount_out_of_range",
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::Empty => "amount must be present and non-empty.",
            Self::AmbiguousSeparator => {
                "amount uses ambiguous decimal/thousands separators; use a single `.` or `,` followed by 1 or 2 digits."
            }
            Self::TooManyDecimals => "amount must use at most 2 decimal places.",
            Self::Invalid => "amount must be numeric.",
            Self::Overflow => "amount is too large to store.",
        }
    }
}

pub fn parse_amount_cents(raw: &str) -> Result<i64, AmountError> {
    let trimmed = trim_amount(raw);
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (negated, inner) = match trimmed
        .strip_prefix('(')
        .and_then(|value| value.strip_suffix(')'))
    {
        Some(inner) => (true, trim_amount(inner)),
        None => (false, trimmed),
    };

    let (negative_sign, unsigned) = split_sign(inner);
    if negated && negative_sign {
        return Err(AmountError::Invalid);
    }
    let negative = negated || negative_sign;

    let body: String = unsigned
        .chars()
        .filter(|value| !GROUPING_SPACES.contains(value))
        .collect();
    if body.is_empty() {
        return Err(AmountError::Invalid);
    }
    if body
        .chars()
        .any(|value| !value.is_ascii_digit() && value != '.' && value != ',')
    {
        return Err(AmountError::Invalid);
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();
    if dots > 0 && commas > 0 {
        return Err(AmountError::AmbiguousSeparator);
    }
    if dots + commas > 1 {
        return Err(AmountError::AmbiguousSeparator);
    }

    let (whole, fraction) = match body.find(['.', ',']) {
        Some(index) => (&body[..index], &body[index + 1..]),
        None => (body.as_str(), ""),
    };
    if whole.is_empty() {
        return Err(AmountError::Invalid);
    }
    if dots + commas == 1 {
        match fraction.len() {
            0 => return Err(AmountError::Invalid),
            1 | 2 => {}
            3 => return Err(AmountError::AmbiguousSeparator),
            _ => return Err(AmountError::TooManyDecimals),
        }
    }

    let whole_units = whole
        .parse::<i64>()
        .map_err(|_| AmountError::Overflow)?;
    let fraction_cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| AmountError::Invalid)? * 10,
        _ => fraction.parse::<i64>().map_err(|_| AmountError::Invalid)?,
    };

    let magnitude = whole_units
        .checked_mul(100)
        .and_then(|value| value.checked_add(fraction_cents))
        .filter(|value| *value <= MAX_AMOUNT_CENTS)
        .ok_or(AmountError::Overflow)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Renders cents as a plain decimal string, e.g. `-1234.05`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}

fn trim_amount(value: &str) -> &str {
    value.trim_matches(|candidate: char| {
        candidate.is_whitespace() || CURRENCY_SYMBOLS.contains(&candidate)
    })
}

fn split_sign(value: &str) -> (bool, &str) {
    if let Some(rest) = value.strip_prefix('-') {
        return (true, trim_amount(rest));
    }
    if let Some(rest) = value.strip_prefix('+') {
        return (false, trim_amount(rest));
    }
    (false, value)
}
