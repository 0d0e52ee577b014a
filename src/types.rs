// src/types.rs
use alloy::primitives::{Sign as WordSign, TxHash, I256, U256};
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, Sign};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest exponent whose power of ten still fits a 256-bit word.
pub const MAX_EXPO: u32 = 77;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Commodities, // commodities-api.com latest rates
    Fred,        // St. Louis Fed series observations
    Eia,         // EIA v2 energy series
    Ninjas,      // API Ninjas commodity price
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Commodities => "commodities",
            ProviderId::Fred => "fred",
            ProviderId::Eia => "eia",
            ProviderId::Ninjas => "ninjas",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commodities" | "commodities-api" => Ok(ProviderId::Commodities),
            "fred" => Ok(ProviderId::Fred),
            "eia" => Ok(ProviderId::Eia),
            "ninjas" | "api-ninjas" => Ok(ProviderId::Ninjas),
            other => Err(format!("unknown price provider `{other}`")),
        }
    }
}

/// One price reading as returned by a provider, before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub value: Decimal,
    pub provider: ProviderId,
    pub observed_at: DateTime<Utc>,
}

/// ABI type of the consumer's `updatePrice` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Int256,
    Uint256,
}

impl FromStr for ValueType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int256" | "int" | "signed" => Ok(ValueType::Int256),
            "uint256" | "uint" | "unsigned" => Ok(ValueType::Uint256),
            other => Err(format!("unknown value type `{other}`")),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScaleError {
    #[error("negative price {0} cannot be encoded as uint256")]
    Negative(Decimal),
    #[error("scaled price does not fit a 256-bit word")]
    Overflow,
    #[error("unsupported exponent {0} (max {MAX_EXPO})")]
    UnsupportedExpo(u32),
}

/// Fixed-point price: `value` units of `10^-expo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledPrice {
    pub value: BigInt,
    pub expo: u32,
    pub value_type: ValueType,
}

impl ScaledPrice {
    pub fn to_uint256(&self) -> Result<U256, ScaleError> {
        let (sign, bytes) = self.value.to_bytes_be();
        if sign == Sign::Minus {
            return Err(ScaleError::Overflow);
        }
        U256::try_from_be_slice(&bytes).ok_or(ScaleError::Overflow)
    }

    pub fn to_int256(&self) -> Result<I256, ScaleError> {
        let (sign, bytes) = self.value.to_bytes_be();
        let abs = U256::try_from_be_slice(&bytes).ok_or(ScaleError::Overflow)?;
        let sign = if sign == Sign::Minus { WordSign::Negative } else { WordSign::Positive };
        I256::checked_from_sign_and_abs(sign, abs).ok_or(ScaleError::Overflow)
    }
}

impl fmt::Display for ScaledPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e-{}", self.value, self.expo)
    }
}

/// Scale a decimal price to the consumer's fixed-point integer.
///
/// Exact: the decimal's mantissa is shifted by `expo` digits on a `BigInt`.
/// When the input carries more fractional digits than `expo`, the result is
/// rounded half away from zero (`0.5 -> 1`, `-0.5 -> -1`).
pub fn scale_by_expo(raw: Decimal, expo: u32, value_type: ValueType) -> Result<ScaledPrice, ScaleError> {
    if expo > MAX_EXPO {
        return Err(ScaleError::UnsupportedExpo(expo));
    }
    if value_type == ValueType::Uint256 && raw.is_sign_negative() && !raw.is_zero() {
        return Err(ScaleError::Negative(raw));
    }

    let mantissa = BigInt::from(raw.mantissa());
    let frac_digits = raw.scale();
    let value = if expo >= frac_digits {
        mantissa * pow10(expo - frac_digits)
    } else {
        let divisor = pow10(frac_digits - expo);
        let quotient = &mantissa / &divisor; // truncates toward zero
        let remainder = &mantissa % &divisor;
        if remainder.magnitude() * 2u32 >= *divisor.magnitude() {
            match mantissa.sign() {
                Sign::Minus => quotient - 1u32,
                _ => quotient + 1u32,
            }
        } else {
            quotient
        }
    };

    let scaled = ScaledPrice { value, expo, value_type };
    match value_type {
        ValueType::Uint256 => scaled.to_uint256().map(|_| ())?,
        ValueType::Int256 => scaled.to_int256().map(|_| ())?,
    }
    Ok(scaled)
}

fn pow10(n: u32) -> BigInt {
    BigInt::from(10u32).pow(n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Skipped,
    Sent,
    Confirmed,
    Failed,
}

/// Flat error tag recorded on an attempt (and used as a metrics label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Fetch,
    MalformedResponse,
    Scaling,
    Submission,
    ConfirmationTimeout,
    CycleTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Scaling => "scaling",
            ErrorKind::Submission => "submission",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::CycleTimeout => "cycle_timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one scheduler cycle. Lives only until it has been logged.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAttempt {
    pub cycle_id: u64,
    pub started_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub price: Option<ScaledPrice>,
    pub tx_hash: Option<TxHash>,
    pub error: Option<ErrorKind>,
    pub reason: Option<String>,
}

impl UpdateAttempt {
    pub fn new(cycle_id: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            outcome: Outcome::Skipped,
            price: None,
            tx_hash: None,
            error: None,
            reason: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Process exit status for one-shot mode.
    pub fn exit_code(&self) -> u8 {
        if self.is_failed() { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn scales_reference_price() {
        let p = scale_by_expo(dec("3.85"), 6, ValueType::Int256).unwrap();
        assert_eq!(p.value, BigInt::from(3_850_000));
        assert_eq!(p.expo, 6);
    }

    #[test]
    fn scales_to_eighteen_decimals_exactly() {
        let p = scale_by_expo(dec("3.85"), 18, ValueType::Uint256).unwrap();
        assert_eq!(p.value.to_string(), "3850000000000000000");

        let p = scale_by_expo(dec("123456789.123456789123456789"), 18, ValueType::Uint256).unwrap();
        assert_eq!(p.value.to_string(), "123456789123456789123456789");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(scale_by_expo(dec("0.0000005"), 6, ValueType::Int256).unwrap().value, BigInt::from(1));
        assert_eq!(scale_by_expo(dec("0.0000004999"), 6, ValueType::Int256).unwrap().value, BigInt::from(0));
        assert_eq!(scale_by_expo(dec("-2.5"), 0, ValueType::Int256).unwrap().value, BigInt::from(-3));
        assert_eq!(scale_by_expo(dec("2.49"), 0, ValueType::Int256).unwrap().value, BigInt::from(2));
    }

    #[test]
    fn rejects_negative_for_unsigned_consumer() {
        let err = scale_by_expo(dec("-1.2"), 6, ValueType::Uint256).unwrap_err();
        assert!(matches!(err, ScaleError::Negative(_)));
        // signed consumers take it
        let p = scale_by_expo(dec("-1.2"), 6, ValueType::Int256).unwrap();
        assert_eq!(p.to_int256().unwrap(), I256::try_from(-1_200_000i64).unwrap());
    }

    #[test]
    fn rejects_words_that_overflow() {
        assert_eq!(scale_by_expo(dec("1"), 78, ValueType::Uint256), Err(ScaleError::UnsupportedExpo(78)));
        // 10^77 fits a uint256 but not an int256
        assert!(scale_by_expo(dec("1"), 77, ValueType::Uint256).is_ok());
        assert_eq!(scale_by_expo(dec("1"), 77, ValueType::Int256), Err(ScaleError::Overflow));
    }

    #[test]
    fn converts_to_abi_words() {
        let p = scale_by_expo(dec("0.905"), 8, ValueType::Uint256).unwrap();
        assert_eq!(p.to_uint256().unwrap(), U256::from(90_500_000u64));
        assert_eq!(p.to_string(), "90500000e-8");
    }

    #[test]
    fn parses_provider_and_value_type_names() {
        assert_eq!("FRED".parse::<ProviderId>().unwrap(), ProviderId::Fred);
        assert_eq!("api-ninjas".parse::<ProviderId>().unwrap(), ProviderId::Ninjas);
        assert!("bloomberg".parse::<ProviderId>().is_err());
        assert_eq!("uint256".parse::<ValueType>().unwrap(), ValueType::Uint256);
    }
}
