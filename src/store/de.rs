//! Cell deserializers shared by the table schemas.
//!
//! Numeric columns may come back from a warehouse export as `5`, `5.0` or
//! `NaN`; all of these are accepted, with `NaN` and empty cells reading as null.

use chrono::NaiveDate;
use serde::de::Error;
use serde::{Deserialize, Deserializer};

use crate::dates::parse_date;

/// Optional text cell; blank or whitespace-only reads as null.
pub fn text_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// Optional float; `NaN` reads as null.
pub fn float_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let Some(raw) = text_opt(d)? else {
        return Ok(None);
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| D::Error::custom(format!("invalid number `{raw}`")))?;
    Ok(if value.is_nan() { None } else { Some(value) })
}

/// Optional integer, accepting integral floats such as `1995.0`.
pub fn int_opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let Some(raw) = text_opt(d)? else {
        return Ok(None);
    };
    let s = raw.trim();
    let whole = match s.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f: f64 = s
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid integer `{raw}`")))?;
            if f.is_nan() {
                return Ok(None);
            }
            if f.fract() != 0.0 || !f.is_finite() {
                return Err(D::Error::custom(format!("invalid integer `{raw}`")));
            }
            // 2^63 is exactly representable; anything at or past it saturates
            if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                return Err(D::Error::custom(format!("integer out of range `{raw}`")));
            }
            f as i64
        }
    };
    T::try_from(whole)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("integer out of range `{raw}`")))
}

/// Required float.
pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    float_opt(d)?.ok_or_else(|| D::Error::custom("missing required number"))
}

/// Required integer.
pub fn int<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    int_opt(d)?.ok_or_else(|| D::Error::custom("missing required integer"))
}

/// Optional date; unparsable values coerce to null.
pub fn date_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    Ok(text_opt(d)?.as_deref().and_then(parse_date))
}
