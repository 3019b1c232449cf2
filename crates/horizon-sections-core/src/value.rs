//! Attribute values and the display capability used for section titles.
//!
//! Objects served by an object source expose their attributes as
//! [`AttributeValue`]s. Section keys are attribute values, and section titles
//! are produced by the [`ValueDisplay`] capability. The built-in kinds cover
//! strings, integers, floats, booleans, dates and decimals; new kinds plug in
//! through [`CustomValue`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

/// Capability of producing a human-readable string for a value.
///
/// This is the one-method interface section titles are built from. It is
/// implemented for every built-in attribute kind and can be implemented for
/// application types that are stored as [`AttributeValue::Custom`].
///
/// # Example
///
/// ```
/// use horizon_sections_core::{Decimal, ValueDisplay};
///
/// assert_eq!("Groceries".display_string(), "Groceries");
/// assert_eq!(42i64.display_string(), "42");
/// assert_eq!(Decimal::new(1250, 2).display_string(), "12.5");
/// ```
pub trait ValueDisplay {
    /// Returns the display string for this value.
    fn display_string(&self) -> String;
}

impl ValueDisplay for str {
    fn display_string(&self) -> String {
        self.to_string()
    }
}

impl ValueDisplay for String {
    fn display_string(&self) -> String {
        self.clone()
    }
}

impl ValueDisplay for i64 {
    fn display_string(&self) -> String {
        self.to_string()
    }
}

impl ValueDisplay for i32 {
    fn display_string(&self) -> String {
        self.to_string()
    }
}

impl ValueDisplay for f64 {
    fn display_string(&self) -> String {
        // Whole numbers render without a trailing ".0"
        if self.is_finite() && self.fract() == 0.0 && self.abs() < 1e15 {
            format!("{}", *self as i64)
        } else {
            self.to_string()
        }
    }
}

impl ValueDisplay for bool {
    fn display_string(&self) -> String {
        self.to_string()
    }
}

impl ValueDisplay for DateTime<Utc> {
    fn display_string(&self) -> String {
        self.format("%b %-d, %Y").to_string()
    }
}

impl ValueDisplay for NaiveDate {
    fn display_string(&self) -> String {
        self.format("%b %-d, %Y").to_string()
    }
}

// ============================================================================
// Decimal
// ============================================================================

/// A base-10 fixed-point number: `mantissa * 10^-scale`.
///
/// Decimals are kept normalized (no trailing zeros in the fractional part), so
/// `12.50` and `12.5` compare and hash equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Error returned when a string cannot be parsed as a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal '{0}'")]
pub struct ParseDecimalError(String);

impl Decimal {
    /// Largest scale a decimal may carry.
    pub const MAX_SCALE: u32 = 28;

    /// Creates a decimal from a mantissa and a scale.
    ///
    /// Scales above [`MAX_SCALE`](Self::MAX_SCALE) are rounded toward zero.
    pub fn new(mut mantissa: i128, mut scale: u32) -> Self {
        while scale > Self::MAX_SCALE {
            mantissa /= 10;
            scale -= 1;
        }
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    /// Creates a whole-number decimal.
    pub fn from_integer(value: i64) -> Self {
        Self::new(value as i128, 0)
    }

    /// Returns the unscaled mantissa.
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Returns the number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Brings both mantissas to a common scale, or `None` on overflow.
    fn aligned(&self, other: &Self) -> Option<(i128, i128)> {
        match self.scale.cmp(&other.scale) {
            Ordering::Equal => Some((self.mantissa, other.mantissa)),
            Ordering::Greater => {
                let factor = 10i128.checked_pow(self.scale - other.scale)?;
                Some((self.mantissa, other.mantissa.checked_mul(factor)?))
            }
            Ordering::Less => {
                let factor = 10i128.checked_pow(other.scale - self.scale)?;
                Some((self.mantissa.checked_mul(factor)?, other.mantissa))
            }
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.aligned(other) {
            Some((a, b)) => a.cmp(&b),
            None => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{whole}.{fraction}")
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDecimalError(s.to_string());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut mantissa: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = i128::from(c.to_digit(10).ok_or_else(invalid)?);
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit))
                .ok_or_else(invalid)?;
        }
        if negative {
            mantissa = -mantissa;
        }

        let scale = u32::try_from(fraction.len()).map_err(|_| invalid())?;
        Ok(Self::new(mantissa, scale))
    }
}

impl ValueDisplay for Decimal {
    fn display_string(&self) -> String {
        self.to_string()
    }
}

// ============================================================================
// Custom values
// ============================================================================

/// Extension point for attribute kinds the built-in variants do not cover.
///
/// A custom value must be displayable and comparable for equality so that it
/// can serve as a section key. Ordering is optional; values that cannot be
/// ordered against each other fall back to comparing their display strings.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use horizon_sections_core::{AttributeValue, CustomValue, ValueDisplay};
///
/// #[derive(Debug, PartialEq)]
/// struct Priority(u8);
///
/// impl ValueDisplay for Priority {
///     fn display_string(&self) -> String {
///         format!("P{}", self.0)
///     }
/// }
///
/// impl CustomValue for Priority {
///     fn type_name(&self) -> &'static str {
///         "Priority"
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn eq_value(&self, other: &dyn CustomValue) -> bool {
///         other.as_any().downcast_ref::<Self>() == Some(self)
///     }
/// }
///
/// let value = AttributeValue::custom(Priority(1));
/// assert_eq!(value.display_string(), "P1");
/// ```
pub trait CustomValue: ValueDisplay + fmt::Debug + Send + Sync {
    /// Short name of the value kind, used in logs and as an ordering tiebreak.
    fn type_name(&self) -> &'static str;

    /// Returns this value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns `true` if `other` is the same kind and holds an equal value.
    fn eq_value(&self, other: &dyn CustomValue) -> bool;

    /// Orders this value against `other`, if the two are comparable.
    fn cmp_value(&self, _other: &dyn CustomValue) -> Option<Ordering> {
        None
    }
}

// ============================================================================
// AttributeValue
// ============================================================================

/// A single attribute value read from a domain object.
///
/// Equality and ordering are defined across kinds so that attribute values can
/// be used directly as sort keys and section keys:
///
/// - Integers, floats and decimals compare numerically with each other.
/// - Values of unrelated kinds order by kind: booleans, numbers, strings,
///   dates, then custom values.
/// - Floats use IEEE total ordering, so `NaN` equals itself.
#[derive(Clone)]
pub enum AttributeValue {
    /// Text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Fixed-point decimal number.
    Decimal(Decimal),
    /// Application-defined value kind.
    Custom(Arc<dyn CustomValue>),
}

impl AttributeValue {
    /// Wraps an application-defined value.
    pub fn custom<T: CustomValue + 'static>(value: T) -> Self {
        AttributeValue::Custom(Arc::new(value))
    }

    /// Returns a short name for the kind of value held.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Date(_) => "date",
            AttributeValue::Decimal(_) => "decimal",
            AttributeValue::Custom(value) => value.type_name(),
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to get the value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the value as a float. Integers and decimals convert.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(n) => Some(*n),
            AttributeValue::Integer(n) => Some(*n as f64),
            AttributeValue::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as a date.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Attempts to get the value as a decimal.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AttributeValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Attempts to downcast a custom value to the specified type.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            AttributeValue::Custom(value) => value.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns `true` for the numeric kinds.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeValue::Integer(_) | AttributeValue::Float(_) | AttributeValue::Decimal(_)
        )
    }

    fn kind_rank(&self) -> u8 {
        match self {
            AttributeValue::Bool(_) => 0,
            AttributeValue::Integer(_) | AttributeValue::Float(_) | AttributeValue::Decimal(_) => 1,
            AttributeValue::String(_) => 2,
            AttributeValue::Date(_) => 3,
            AttributeValue::Custom(_) => 4,
        }
    }

    /// Total ordering used by sort descriptors.
    pub fn compare(&self, other: &Self) -> Ordering {
        use AttributeValue as V;

        match (self, other) {
            (V::String(a), V::String(b)) => a.cmp(b),
            (V::Integer(a), V::Integer(b)) => a.cmp(b),
            (V::Float(a), V::Float(b)) => a.total_cmp(b),
            (V::Decimal(a), V::Decimal(b)) => a.cmp(b),
            (V::Integer(a), V::Decimal(b)) => Decimal::from_integer(*a).cmp(b),
            (V::Decimal(a), V::Integer(b)) => a.cmp(&Decimal::from_integer(*b)),
            (V::Bool(a), V::Bool(b)) => a.cmp(b),
            (V::Date(a), V::Date(b)) => a.cmp(b),
            (V::Custom(a), V::Custom(b)) => {
                if a.eq_value(b.as_ref()) {
                    Ordering::Equal
                } else {
                    a.cmp_value(b.as_ref()).unwrap_or_else(|| {
                        a.type_name()
                            .cmp(b.type_name())
                            .then_with(|| a.display_string().cmp(&b.display_string()))
                    })
                }
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                // Mixed float comparisons go through f64
                let (x, y) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for AttributeValue {}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.debug_tuple("String").field(s).finish(),
            AttributeValue::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            AttributeValue::Float(n) => f.debug_tuple("Float").field(n).finish(),
            AttributeValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            AttributeValue::Date(d) => f.debug_tuple("Date").field(d).finish(),
            AttributeValue::Decimal(d) => f.debug_tuple("Decimal").field(&d.to_string()).finish(),
            AttributeValue::Custom(value) => f.debug_tuple("Custom").field(value).finish(),
        }
    }
}

impl ValueDisplay for AttributeValue {
    fn display_string(&self) -> String {
        match self {
            AttributeValue::String(s) => s.display_string(),
            AttributeValue::Integer(n) => n.display_string(),
            AttributeValue::Float(n) => n.display_string(),
            AttributeValue::Bool(b) => b.display_string(),
            AttributeValue::Date(d) => d.display_string(),
            AttributeValue::Decimal(d) => d.display_string(),
            AttributeValue::Custom(value) => value.display_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Integer(n)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        AttributeValue::Integer(n as i64)
    }
}

impl From<usize> for AttributeValue {
    fn from(n: usize) -> Self {
        AttributeValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Float(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(d: DateTime<Utc>) -> Self {
        AttributeValue::Date(d)
    }
}

impl From<Decimal> for AttributeValue {
    fn from(d: Decimal) -> Self {
        AttributeValue::Decimal(d)
    }
}
