use bitrpc_bits::precision_for_span;

use crate::attr::{Range, RangeViolation};
use crate::error::{Result, SchemaError};
use crate::types::IntKind;

/// Maps an integer field's values to and from its on-wire bits.
///
/// With a range, values are offset by `min` and take `precision(min, max)`
/// bits. Without one, values take the kind's full width in two's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeMap {
    kind: IntKind,
    mapping: Mapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapping {
    Native,
    Offset {
        min: i128,
        max: i128,
        bits: u32,
        clamp: bool,
    },
}

impl RangeMap {
    /// Full-width mapping for `kind`.
    pub fn native(kind: IntKind) -> Self {
        Self {
            kind,
            mapping: Mapping::Native,
        }
    }

    /// Resolve the mapping for a field of `kind`, validating `range` if given.
    pub fn resolve(kind: IntKind, range: Option<&Range>, field: &str) -> Result<Self> {
        let Some(range) = range else {
            return Ok(Self::native(kind));
        };
        let (min, max) = (range.min, range.max);
        let invalid = |reason| SchemaError::InvalidRange {
            field: field.to_string(),
            min,
            max,
            reason,
        };

        if max < min {
            return Err(invalid("maximum is below minimum"));
        }
        if !kind.is_signed() && min < 0 {
            return Err(SchemaError::UnsignedRange {
                field: field.to_string(),
                min,
                max,
            });
        }
        if !kind.contains(min) || !kind.contains(max) {
            return Err(invalid("bounds exceed the integer type"));
        }

        let span = (max - min) as u64;
        Ok(Self {
            kind,
            mapping: Mapping::Offset {
                min,
                max,
                bits: precision_for_span(span),
                clamp: range.on_violation == RangeViolation::Clamp,
            },
        })
    }

    /// Number of bits on the wire.
    pub fn bits(&self) -> u32 {
        match self.mapping {
            Mapping::Native => self.kind.bits(),
            Mapping::Offset { bits, .. } => bits,
        }
    }

    pub fn kind(&self) -> IntKind {
        self.kind
    }

    /// Smallest and largest encodable values.
    pub fn bounds(&self) -> (i128, i128) {
        match self.mapping {
            Mapping::Native => (self.kind.min(), self.kind.max()),
            Mapping::Offset { min, max, .. } => (min, max),
        }
    }

    /// Turn `value` into the raw bits to write.
    pub fn encode(&self, value: i128, field: &str) -> Result<u64> {
        let (min, max) = self.bounds();
        let value = if (min..=max).contains(&value) {
            value
        } else {
            match self.mapping {
                Mapping::Offset { clamp: true, .. } => value.clamp(min, max),
                _ => {
                    return Err(SchemaError::OutOfRange {
                        field: field.to_string(),
                        value,
                        min,
                        max,
                    })
                }
            }
        };

        Ok(match self.mapping {
            Mapping::Native => (value as u64) & mask(self.kind.bits()),
            Mapping::Offset { min, .. } => (value - min) as u64,
        })
    }

    /// Turn raw bits read from the wire back into a value.
    pub fn decode(&self, raw: u64, field: &str) -> Result<i128> {
        match self.mapping {
            Mapping::Native => {
                let bits = self.kind.bits();
                let raw = raw & mask(bits);
                if self.kind.is_signed() {
                    let shift = 64 - bits;
                    Ok(i128::from(((raw << shift) as i64) >> shift))
                } else {
                    Ok(i128::from(raw))
                }
            }
            Mapping::Offset { min, max, .. } => {
                let value = min + i128::from(raw);
                if value > max {
                    return Err(SchemaError::OutOfRange {
                        field: field.to_string(),
                        value,
                        min,
                        max,
                    });
                }
                Ok(value)
            }
        }
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
