//! Numeric and boolean readings of string values.
//!
//! Every value is a string; whether it is an integer, a float or neither is
//! decided by its formatting at the point of use.

use super::error::RuntimeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const TRUE: &str = "1";
pub const FALSE: &str = "0";

static INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("Error compiling regex."));
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("Error compiling regex.")
});

pub fn bool_to_str(b: bool) -> String {
    if b { TRUE } else { FALSE }.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Truncates floats toward zero.
    pub fn to_int(self) -> Number {
        match self {
            Number::Float(x) => Number::Int(x as i64),
            int => int,
        }
    }

    pub fn to_float(self) -> Number {
        Number::Float(self.as_f64())
    }

    pub fn negate(self) -> Number {
        match self {
            Number::Int(n) => n.checked_neg().map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(x) => Number::Float(-x),
        }
    }

    pub fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    /// True division; always a float.
    pub fn div(self, other: Number) -> Result<Number, RuntimeError> {
        let divisor = other.as_f64();
        if divisor == 0.0 {
            return Err(RuntimeError::handler("division by zero"));
        }
        Ok(Number::Float(self.as_f64() / divisor))
    }

    /// Division rounding toward negative infinity.
    pub fn floor_div(self, other: Number) -> Result<Number, RuntimeError> {
        match (self, other) {
            (_, Number::Int(0)) => Err(RuntimeError::handler("division by zero")),
            (Number::Int(a), Number::Int(b)) => {
                let Some(q) = a.checked_div(b) else {
                    return Ok(Number::Float((a as f64 / b as f64).floor()));
                };
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(Number::Int(q - 1))
                } else {
                    Ok(Number::Int(q))
                }
            }
            (a, b) => a.div(b).map(|q| Number::Float(q.as_f64().floor())),
        }
    }

    /// Remainder carrying the sign of the divisor.
    pub fn modulo(self, other: Number) -> Result<Number, RuntimeError> {
        match (self, other) {
            (_, Number::Int(0)) => Err(RuntimeError::handler("modulo by zero")),
            (Number::Int(a), Number::Int(b)) => {
                let r = a.checked_rem(b).unwrap_or(0);
                if r != 0 && ((r < 0) != (b < 0)) {
                    Ok(Number::Int(r + b))
                } else {
                    Ok(Number::Int(r))
                }
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                if b == 0.0 {
                    return Err(RuntimeError::handler("modulo by zero"));
                }
                let r = a % b;
                if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                    Ok(Number::Float(r + b))
                } else {
                    Ok(Number::Float(r))
                }
            }
        }
    }

    /// Integer arithmetic that overflows falls back to floats.
    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
                Some(n) => Number::Int(n),
                None => Number::Float(float_op(a as f64, b as f64)),
            },
            (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            // `Debug` always keeps a decimal point or an exponent.
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// A borrowed script value with fallible typed readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value<'a>(&'a str);

impl<'a> Value<'a> {
    pub fn new(s: &'a str) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// `"0"` is false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        self.0 != FALSE
    }

    /// Integer first, then float; `None` for anything else.
    pub fn number(&self) -> Option<Number> {
        let s = self.0.trim();
        if INT.is_match(s) {
            return Some(match s.parse::<i64>() {
                Ok(n) => Number::Int(n),
                Err(_) => Number::Float(s.parse::<f64>().ok()?),
            });
        }
        if FLOAT.is_match(s) {
            return s.parse::<f64>().ok().map(Number::Float);
        }
        None
    }

    pub fn to_number(&self) -> Result<Number, RuntimeError> {
        self.number().ok_or_else(|| {
            RuntimeError::format(format!("{:?} is not a valid int or float", self.0))
        })
    }

    pub fn to_int(&self) -> Result<i64, RuntimeError> {
        match self.to_number()? {
            Number::Int(n) => Ok(n),
            Number::Float(_) => Err(RuntimeError::format(format!(
                "{:?} is not a valid integer",
                self.0
            ))),
        }
    }

    /// Whitespace-separated items.
    pub fn items(&self) -> impl Iterator<Item = &'a str> {
        self.0.split_whitespace()
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads every value as a number. If any of them is a float, all of them
/// are promoted to floats.
pub fn require_all_numeric<S: AsRef<str>>(values: &[S]) -> Result<Vec<Number>, RuntimeError> {
    let numbers = values
        .iter()
        .map(|v| Value::new(v.as_ref()).to_number())
        .collect::<Result<Vec<_>, _>>()?;
    if numbers.iter().any(|n| n.is_float()) {
        Ok(numbers.into_iter().map(Number::to_float).collect())
    } else {
        Ok(numbers)
    }
}
