//! Brazilian tax document types.
//!
//! A `PF` (individual) shopper identifies with a CPF, a `PJ` (business)
//! shopper with a CNPJ. Both carry mod-11 check digits; both reject
//! repeated-digit sequences (e.g., `111.111.111-11`), which pass the
//! arithmetic but are not valid documents.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Cpf`] or [`Cnpj`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The input string is empty.
    #[error("document cannot be empty")]
    Empty,
    /// The input has the wrong number of digits.
    #[error("document must have {expected} digits (got {got})")]
    WrongLength {
        /// Expected digit count.
        expected: usize,
        /// Actual digit count.
        got: usize,
    },
    /// All digits are identical.
    #[error("document cannot be a repeated-digit sequence")]
    RepeatedDigits,
    /// The check digits do not match.
    #[error("document check digits are invalid")]
    InvalidCheckDigits,
}

/// Strip formatting punctuation, keeping only ASCII digits.
fn digits_of(s: &str) -> Vec<u8> {
    s.chars()
        .filter(char::is_ascii_digit)
        .filter_map(|c| c.to_digit(10))
        .map(|d| u8::try_from(d).unwrap_or(0))
        .collect()
}

/// Mod-11 check digit over `digits` using the given descending weights.
fn check_digit(digits: &[u8], weights: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .zip(weights)
        .map(|(&d, &w)| u32::from(d) * u32::from(w))
        .sum();
    let rem = sum % 11;
    if rem < 2 { 0 } else { u8::try_from(11 - rem).unwrap_or(0) }
}

fn all_same(digits: &[u8]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// A CPF (Cadastro de Pessoas Físicas) - individual taxpayer id.
///
/// Stored as the 11 bare digits; formatting is applied on display.
///
/// ```
/// use varejo_core::Cpf;
///
/// assert!(Cpf::parse("529.982.247-25").is_ok());
/// assert!(Cpf::parse("52998224725").is_ok());
/// assert!(Cpf::parse("111.111.111-11").is_err()); // repeated digits
/// assert!(Cpf::parse("529.982.247-26").is_err()); // bad check digit
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cpf(String);

impl Cpf {
    /// Number of digits in a CPF.
    pub const LENGTH: usize = 11;

    /// Parse a CPF from a string, accepting common punctuation.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit count, repetition rule, or check
    /// digits fail.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        if s.trim().is_empty() {
            return Err(DocumentError::Empty);
        }

        let digits = digits_of(s);
        if digits.len() != Self::LENGTH {
            return Err(DocumentError::WrongLength {
                expected: Self::LENGTH,
                got: digits.len(),
            });
        }

        if all_same(&digits) {
            return Err(DocumentError::RepeatedDigits);
        }

        let d1 = check_digit(&digits[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
        let d2 = check_digit(&digits[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);
        if digits[9] != d1 || digits[10] != d2 {
            return Err(DocumentError::InvalidCheckDigits);
        }

        Ok(Self(digits.iter().map(|d| char::from(b'0' + d)).collect()))
    }

    /// Returns the bare 11 digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    /// Formats as `XXX.XXX.XXX-XX`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(f, "{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
    }
}

impl std::str::FromStr for Cpf {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A CNPJ (Cadastro Nacional da Pessoa Jurídica) - business taxpayer id.
///
/// Stored as the 14 bare digits; formatting is applied on display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cnpj(String);

impl Cnpj {
    /// Number of digits in a CNPJ.
    pub const LENGTH: usize = 14;

    /// Parse a CNPJ from a string, accepting common punctuation.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit count, repetition rule, or check
    /// digits fail.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        if s.trim().is_empty() {
            return Err(DocumentError::Empty);
        }

        let digits = digits_of(s);
        if digits.len() != Self::LENGTH {
            return Err(DocumentError::WrongLength {
                expected: Self::LENGTH,
                got: digits.len(),
            });
        }

        if all_same(&digits) {
            return Err(DocumentError::RepeatedDigits);
        }

        let d1 = check_digit(&digits[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
        let d2 = check_digit(&digits[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
        if digits[12] != d1 || digits[13] != d2 {
            return Err(DocumentError::InvalidCheckDigits);
        }

        Ok(Self(digits.iter().map(|d| char::from(b'0' + d)).collect()))
    }

    /// Returns the bare 14 digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cnpj {
    /// Formats as `XX.XXX.XXX/XXXX-XX`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(
            f,
            "{}.{}.{}/{}-{}",
            &d[..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..]
        )
    }
}

impl std::str::FromStr for Cnpj {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cpf_valid() {
        assert!(Cpf::parse("529.982.247-25").is_ok());
        assert!(Cpf::parse("52998224725").is_ok());
        assert!(Cpf::parse("168.995.350-09").is_ok());
    }

    #[test]
    fn test_cpf_empty() {
        assert_eq!(Cpf::parse("   "), Err(DocumentError::Empty));
    }

    #[test]
    fn test_cpf_wrong_length() {
        assert!(matches!(
            Cpf::parse("1234"),
            Err(DocumentError::WrongLength {
                expected: 11,
                got: 4
            })
        ));
    }

    #[test]
    fn test_cpf_repeated_digits() {
        assert_eq!(
            Cpf::parse("111.111.111-11"),
            Err(DocumentError::RepeatedDigits)
        );
        assert_eq!(Cpf::parse("00000000000"), Err(DocumentError::RepeatedDigits));
    }

    #[test]
    fn test_cpf_bad_check_digits() {
        assert_eq!(
            Cpf::parse("529.982.247-26"),
            Err(DocumentError::InvalidCheckDigits)
        );
    }

    #[test]
    fn test_cpf_display() {
        let cpf = Cpf::parse("52998224725").unwrap();
        assert_eq!(cpf.to_string(), "529.982.247-25");
        assert_eq!(cpf.as_str(), "52998224725");
    }

    #[test]
    fn test_cnpj_valid() {
        assert!(Cnpj::parse("11.222.333/0001-81").is_ok());
        assert!(Cnpj::parse("11222333000181").is_ok());
    }

    #[test]
    fn test_cnpj_bad_check_digits() {
        assert_eq!(
            Cnpj::parse("11.222.333/0001-82"),
            Err(DocumentError::InvalidCheckDigits)
        );
    }

    #[test]
    fn test_cnpj_repeated_digits() {
        assert_eq!(
            Cnpj::parse("11111111111111"),
            Err(DocumentError::RepeatedDigits)
        );
    }

    #[test]
    fn test_cnpj_display() {
        let cnpj = Cnpj::parse("11222333000181").unwrap();
        assert_eq!(cnpj.to_string(), "11.222.333/0001-81");
    }

    #[test]
    fn test_serde_roundtrip() {
        let cpf = Cpf::parse("529.982.247-25").unwrap();
        let json = serde_json::to_string(&cpf).unwrap();
        assert_eq!(json, "\"52998224725\"");
        let parsed: Cpf = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cpf);
    }
}
