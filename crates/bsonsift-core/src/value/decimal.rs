//! Decimal128 storage and canonical string rendering.
//!
//! Values are kept as their 16 raw bytes (IEEE 754-2008, binary integer
//! decimal encoding). Only rendering is implemented; no arithmetic.

use std::fmt;

const EXPONENT_BIAS: i64 = 6176;
const MAX_SIGNIFICAND: u128 = 10u128.pow(34) - 1;

/// A 128-bit decimal floating point value
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128([u8; 16]);

impl Decimal128 {
    /// Wraps the little-endian wire bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the little-endian wire bytes
    pub fn bytes(&self) -> [u8; 16] {
        self.0
    }

    fn halves(&self) -> (u64, u64) {
        let mut low = [0u8; 8];
        let mut high = [0u8; 8];
        low.copy_from_slice(&self.0[..8]);
        high.copy_from_slice(&self.0[8..]);
        (u64::from_le_bytes(high), u64::from_le_bytes(low))
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal128({})", self)
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (high, low) = self.halves();
        let sign = if high >> 63 == 1 { "-" } else { "" };
        let combination = (high >> 58) & 0x1F;

        let (biased_exponent, significand) = if combination >> 3 == 0b11 {
            match combination {
                0x1E => return write!(f, "{sign}Infinity"),
                0x1F => return f.write_str("NaN"),
                // Implicit 0b100 prefix always exceeds the significand range
                _ => ((high >> 47) & 0x3FFF, 0u128),
            }
        } else {
            let significand = (u128::from(high & 0x1_FFFF_FFFF_FFFF) << 64) | u128::from(low);
            let significand = if significand > MAX_SIGNIFICAND {
                0
            } else {
                significand
            };
            ((high >> 49) & 0x3FFF, significand)
        };

        let exponent = biased_exponent as i64 - EXPONENT_BIAS;
        let digits = significand.to_string();
        let scientific_exponent = digits.len() as i64 - 1 + exponent;

        if exponent > 0 || scientific_exponent < -6 {
            let (first, rest) = digits.split_at(1);
            write!(f, "{sign}{first}")?;
            if !rest.is_empty() {
                write!(f, ".{rest}")?;
            }
            let exp_sign = if scientific_exponent >= 0 { "+" } else { "" };
            write!(f, "E{exp_sign}{scientific_exponent}")
        } else if exponent == 0 {
            write!(f, "{sign}{digits}")
        } else {
            let radix = digits.len() as i64 + exponent;
            if radix > 0 {
                let (int, frac) = digits.split_at(radix as usize);
                write!(f, "{sign}{int}.{frac}")
            } else {
                let zeros = "0".repeat(radix.unsigned_abs() as usize);
                write!(f, "{sign}0.{zeros}{digits}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(high: u64, low: u64) -> Decimal128 {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&low.to_le_bytes());
        bytes[8..].copy_from_slice(&high.to_le_bytes());
        Decimal128::from_bytes(bytes)
    }

    fn biased(exponent: i64) -> u64 {
        ((exponent + EXPONENT_BIAS) as u64) << 49
    }

    #[test]
    fn test_integers() {
        assert_eq!(dec(biased(0), 1).to_string(), "1");
        assert_eq!(dec(biased(0), 0).to_string(), "0");
        assert_eq!(dec(biased(0) | 1 << 63, 0).to_string(), "-0");
        assert_eq!(dec(biased(0) | 1 << 63, 42).to_string(), "-42");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(dec(biased(-3), 1).to_string(), "0.001");
        assert_eq!(dec(biased(-2), 12345).to_string(), "123.45");
        assert_eq!(dec(biased(-1), 10).to_string(), "1.0");
    }

    #[test]
    fn test_scientific() {
        assert_eq!(dec(biased(3), 1).to_string(), "1E+3");
        assert_eq!(dec(biased(-10), 12).to_string(), "1.2E-9");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(dec(0x7800_0000_0000_0000, 0).to_string(), "Infinity");
        assert_eq!(dec(0xF800_0000_0000_0000, 0).to_string(), "-Infinity");
        assert_eq!(dec(0x7C00_0000_0000_0000, 0).to_string(), "NaN");
    }
}
