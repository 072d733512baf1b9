use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Canonical cell or column value. Every value crossing the engine goes
/// through [`Scalar::from_text`] or one of the typed constructors so that
/// blanks are `Null` and text is trimmed.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

/// Hashable form of a non-null scalar, used to index rows by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Float(u64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Scalar {
    /// Canonicalizes raw text: blank becomes `Null`, numeric-looking text
    /// becomes a number, date-looking text becomes a date, anything else is
    /// kept as trimmed text.
    pub fn from_text(raw: &str) -> Scalar {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }
        if looks_numeric(trimmed) {
            if let Ok(value) = trimmed.parse::<i64>() {
                return Scalar::Int(value);
            }
            if let Ok(value) = trimmed.parse::<f64>() {
                if value.is_finite() {
                    return Scalar::Float(value);
                }
            }
        }
        if let Some(value) = parse_date(trimmed) {
            return value;
        }
        Scalar::Text(trimmed.to_string())
    }

    pub fn from_float(value: f64) -> Scalar {
        if value.is_finite() {
            Scalar::Float(value)
        } else {
            Scalar::Text(value.to_string())
        }
    }

    /// Converts an Excel serial date. Whole-day serials become plain dates.
    pub fn from_excel_serial(serial: f64) -> Scalar {
        let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
        else {
            return Scalar::from_float(serial);
        };
        let millis = (serial * 86_400_000.0).round();
        if !millis.is_finite() || millis.abs() > 1.0e15 {
            return Scalar::from_float(serial);
        }
        match epoch.checked_add_signed(Duration::milliseconds(millis as i64)) {
            Some(datetime) => Scalar::DateTime(datetime).normalized(),
            None => Scalar::from_float(serial),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Canonical form of a value read back from storage. Stored text goes
    /// through [`Scalar::from_text`] like a spreadsheet cell would.
    pub fn canonical(&self) -> Scalar {
        match self {
            Scalar::Text(text) => Scalar::from_text(text),
            Scalar::Float(value) => Scalar::from_float(*value),
            other => other.clone(),
        }
    }

    /// Collapses representations that mean the same thing: integral floats
    /// become integers and midnight datetimes become dates.
    pub fn normalized(self) -> Scalar {
        match self {
            Scalar::Float(value) if is_integral(value) => Scalar::Int(value as i64),
            Scalar::DateTime(value) if is_midnight(&value) => Scalar::Date(value.date()),
            other => other,
        }
    }

    /// Type-aware equality used by the diff: numbers compare numerically,
    /// dates compare as dates, text compares exactly, and null only equals null.
    pub fn canonical_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Null, _) | (_, Scalar::Null) => false,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Int(a), Scalar::Float(b)) | (Scalar::Float(b), Scalar::Int(a)) => {
                float_eq(*a as f64, *b)
            }
            (Scalar::Float(a), Scalar::Float(b)) => float_eq(*a, *b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Bool(a), Scalar::Int(b)) | (Scalar::Int(b), Scalar::Bool(a)) => {
                i64::from(*a) == *b
            }
            (Scalar::Date(a), Scalar::Date(b)) => a == b,
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a == b,
            (Scalar::Date(a), Scalar::DateTime(b)) | (Scalar::DateTime(b), Scalar::Date(a)) => {
                is_midnight(b) && b.date() == *a
            }
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Key used for matching. `None` for null or blank values, which cannot
    /// participate in reconciliation.
    pub fn key(&self) -> Option<KeyValue> {
        match self.clone().normalized() {
            Scalar::Null => None,
            Scalar::Text(text) if text.trim().is_empty() => None,
            Scalar::Int(value) => Some(KeyValue::Int(value)),
            Scalar::Float(value) => Some(KeyValue::Float(value.to_bits())),
            Scalar::Bool(value) => Some(KeyValue::Bool(value)),
            Scalar::Date(value) => Some(KeyValue::Date(value)),
            Scalar::DateTime(value) => Some(KeyValue::DateTime(value)),
            Scalar::Text(text) => Some(KeyValue::Text(text.trim().to_string())),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "(null)"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) if is_integral(*value) => write!(f, "{}", *value as i64),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Scalar::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
            Scalar::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Storage class of a target column, derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Numeric,
    Text,
    Date,
    DateTime,
    Boolean,
    Any,
}

impl ColumnType {
    /// SQLite affinity rules, extended with the date and boolean names
    /// that are common in hand-written schemas.
    pub fn from_declared(declared: &str) -> ColumnType {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.is_empty() || upper.contains("BLOB") {
            ColumnType::Any
        } else if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            ColumnType::DateTime
        } else if upper.contains("DATE") {
            ColumnType::Date
        } else {
            ColumnType::Numeric
        }
    }

    /// Converts a canonical value into the representation stored by a column
    /// of this type.
    pub fn coerce(self, value: &Scalar) -> Result<Scalar, TypeMismatch> {
        let mismatch = || TypeMismatch {
            expected: self,
            value: value.clone(),
        };
        if value.is_null() {
            return Ok(Scalar::Null);
        }
        match self {
            ColumnType::Any => Ok(value.clone()),
            ColumnType::Integer => match value {
                Scalar::Int(v) => Ok(Scalar::Int(*v)),
                Scalar::Float(v) if is_integral(*v) => Ok(Scalar::Int(*v as i64)),
                Scalar::Bool(v) => Ok(Scalar::Int(i64::from(*v))),
                _ => Err(mismatch()),
            },
            ColumnType::Real => match value {
                Scalar::Int(v) => Ok(Scalar::Float(*v as f64)),
                Scalar::Float(v) => Ok(Scalar::Float(*v)),
                _ => Err(mismatch()),
            },
            ColumnType::Numeric => match value {
                Scalar::Int(_) | Scalar::Float(_) => Ok(value.clone().normalized()),
                Scalar::Bool(v) => Ok(Scalar::Int(i64::from(*v))),
                _ => Err(mismatch()),
            },
            ColumnType::Text => match value {
                Scalar::Text(v) => Ok(Scalar::Text(v.clone())),
                other => Ok(Scalar::Text(other.to_string())),
            },
            ColumnType::Date => match value {
                Scalar::Date(v) => Ok(Scalar::Date(*v)),
                Scalar::DateTime(v) if is_midnight(v) => Ok(Scalar::Date(v.date())),
                _ => Err(mismatch()),
            },
            ColumnType::DateTime => match value {
                Scalar::Date(_) | Scalar::DateTime(_) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            ColumnType::Boolean => match value {
                Scalar::Bool(v) => Ok(Scalar::Bool(*v)),
                Scalar::Int(0) => Ok(Scalar::Bool(false)),
                Scalar::Int(1) => Ok(Scalar::Bool(true)),
                Scalar::Text(v) => match v.to_ascii_lowercase().as_str() {
                    "true" | "yes" => Ok(Scalar::Bool(true)),
                    "false" | "no" => Ok(Scalar::Bool(false)),
                    _ => Err(mismatch()),
                },
                _ => Err(mismatch()),
            },
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Boolean => "boolean",
            ColumnType::Any => "any",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("'{value}' is not a valid {expected} value")]
pub struct TypeMismatch {
    pub expected: ColumnType,
    pub value: Scalar,
}

/// Digit strings with a leading zero (`"00123"`) are identifiers, not numbers.
fn looks_numeric(text: &str) -> bool {
    let digits = text
        .strip_prefix(|c: char| c == '-' || c == '+')
        .unwrap_or(text);
    let mut chars = digits.chars();
    match (chars.next(), chars.next()) {
        (Some('0'), Some(c)) if c.is_ascii_digit() => false,
        (Some(c), _) => c.is_ascii_digit() || c == '.',
        (None, _) => false,
    }
}

fn parse_date(text: &str) -> Option<Scalar> {
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(Scalar::Date(date));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Scalar::DateTime(datetime));
        }
    }
    None
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15
}

fn is_midnight(value: &NaiveDateTime) -> bool {
    value.hour() == 0 && value.minute() == 0 && value.second() == 0 && value.nanosecond() == 0
}

fn float_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= scale * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn from_text_canonicalizes_by_shape() {
        assert_eq!(Scalar::from_text("   "), Scalar::Null);
        assert_eq!(Scalar::from_text(" 42 "), Scalar::Int(42));
        assert_eq!(Scalar::from_text("-3.5"), Scalar::Float(-3.5));
        assert_eq!(Scalar::from_text("2024-03-01"), Scalar::Date(date(2024, 3, 1)));
        assert_eq!(Scalar::from_text("2024/03/01"), Scalar::Date(date(2024, 3, 1)));
        assert_eq!(
            Scalar::from_text("2024-03-01 10:30:00"),
            Scalar::DateTime(date(2024, 3, 1).and_hms_opt(10, 30, 0).expect("valid time"))
        );
        assert_eq!(Scalar::from_text("  Alice "), Scalar::Text("Alice".to_string()));
    }

    #[test]
    fn leading_zero_codes_stay_text() {
        assert_eq!(Scalar::from_text("00123"), Scalar::Text("00123".to_string()));
        assert_eq!(Scalar::from_text("0.5"), Scalar::Float(0.5));
        assert_eq!(Scalar::from_text("0"), Scalar::Int(0));
    }

    #[test]
    fn canonical_eq_is_type_aware() {
        assert!(Scalar::Int(1).canonical_eq(&Scalar::Float(1.0)));
        assert!(Scalar::Null.canonical_eq(&Scalar::Null));
        assert!(!Scalar::Null.canonical_eq(&Scalar::Text("x".to_string())));
        assert!(!Scalar::Text("Alice".to_string()).canonical_eq(&Scalar::Text("alice".to_string())));
        assert!(Scalar::Bool(true).canonical_eq(&Scalar::Int(1)));
        let midnight = date(2024, 1, 2).and_hms_opt(0, 0, 0).expect("valid time");
        assert!(Scalar::Date(date(2024, 1, 2)).canonical_eq(&Scalar::DateTime(midnight)));
        assert!(!Scalar::Int(1).canonical_eq(&Scalar::Text("1".to_string())));
    }

    #[test]
    fn keys_collapse_equivalent_numbers_and_skip_blanks() {
        assert_eq!(Scalar::Float(7.0).key(), Scalar::Int(7).key());
        assert_eq!(Scalar::Null.key(), None);
        assert_eq!(Scalar::Text("  ".to_string()).key(), None);
        assert_eq!(
            Scalar::Text("A-1".to_string()).key(),
            Some(KeyValue::Text("A-1".to_string()))
        );
    }

    #[test]
    fn excel_serials_convert_to_dates() {
        assert_eq!(Scalar::from_excel_serial(45292.0), Scalar::Date(date(2024, 1, 1)));
        assert_eq!(
            Scalar::from_excel_serial(45292.5),
            Scalar::DateTime(date(2024, 1, 1).and_hms_opt(12, 0, 0).expect("valid time"))
        );
    }

    #[test]
    fn declared_types_follow_affinity_rules() {
        assert_eq!(ColumnType::from_declared("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("varchar(20)"), ColumnType::Text);
        assert_eq!(ColumnType::from_declared("DOUBLE PRECISION"), ColumnType::Real);
        assert_eq!(ColumnType::from_declared("DATE"), ColumnType::Date);
        assert_eq!(ColumnType::from_declared("TIMESTAMP"), ColumnType::DateTime);
        assert_eq!(ColumnType::from_declared("BOOLEAN"), ColumnType::Boolean);
        assert_eq!(ColumnType::from_declared("DECIMAL(10,2)"), ColumnType::Numeric);
        assert_eq!(ColumnType::from_declared(""), ColumnType::Any);
    }

    #[test]
    fn coerce_rejects_values_the_column_cannot_hold() {
        let text = Scalar::Text("abc".to_string());
        let err = ColumnType::Integer.coerce(&text).expect_err("text is not an integer");
        assert_eq!(err.expected, ColumnType::Integer);

        assert_eq!(ColumnType::Integer.coerce(&Scalar::Float(3.0)), Ok(Scalar::Int(3)));
        assert!(ColumnType::Integer.coerce(&Scalar::Float(3.5)).is_err());
        assert_eq!(ColumnType::Text.coerce(&Scalar::Int(42)), Ok(Scalar::Text("42".to_string())));
        assert_eq!(ColumnType::Real.coerce(&Scalar::Null), Ok(Scalar::Null));
        assert_eq!(
            ColumnType::Boolean.coerce(&Scalar::Text("Yes".to_string())),
            Ok(Scalar::Bool(true))
        );
        assert!(ColumnType::Date.coerce(&Scalar::Int(5)).is_err());
    }
}
