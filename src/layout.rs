// Per-message layout planning: presence bits, aux entries and the masked
// decode window.

use std::collections::HashMap;

use prost_types::DescriptorProto;

use crate::classify;
use crate::Error;

/// Field numbers above this would not fit the compressed two-byte tag window.
pub const MAX_FIELD_NUMBER: i32 = 2047;

/// A presence-bit index occupies the 6 bits above the 10-bit slot offset in a
/// decode entry, so at most 64 bits are addressable.
pub const MAX_HAS_BITS: usize = 64;

/// Layout facts for one message, consumed by the struct, accessor and table
/// emitters. Built once per message and discarded after emission.
pub struct MessageLayout {
    has_bit_idx: HashMap<i32, usize>,
    num_has_bits: usize,
    aux_idx: HashMap<i32, usize>,
    num_aux: usize,
    max_field_number: i32,
    num_masked: usize,
}

impl MessageLayout {
    pub fn plan(message: &DescriptorProto, full_name: &str) -> Result<Self, Error> {
        let mut has_bit_idx = HashMap::new();
        let mut aux_idx = HashMap::new();
        let mut num_has_bits = 0;
        let mut num_aux = 0;
        let mut max_field_number = 0;

        for field in &message.field {
            classify::ensure_supported(field)?;

            if field.name().is_empty() {
                return Err(Error::MalformedDescriptor(format!(
                    "unnamed field in '{}'",
                    full_name
                )));
            }
            let number = field.number.ok_or_else(|| {
                Error::MalformedDescriptor(format!(
                    "field '{}' in '{}' has no number",
                    field.name(),
                    full_name
                ))
            })?;
            if number > MAX_FIELD_NUMBER {
                return Err(Error::FieldNumberTooLarge {
                    field: format!("{}.{}", full_name, field.name()),
                    number,
                });
            }
            if number < 1 {
                return Err(Error::MalformedDescriptor(format!(
                    "field '{}' in '{}' has invalid number {}",
                    field.name(),
                    full_name,
                    number
                )));
            }
            max_field_number = max_field_number.max(number);

            if classify::is_message(field)? {
                aux_idx.insert(number, num_aux);
                num_aux += 1;
            } else if classify::needs_has_bit(field)? {
                has_bit_idx.insert(number, num_has_bits);
                num_has_bits += 1;
            }
        }

        if num_has_bits > MAX_HAS_BITS {
            return Err(Error::TooManyPresenceBits {
                message: full_name.to_string(),
                count: num_has_bits,
            });
        }

        // Four masked bits always cover field numbers 0..15; larger numbers
        // need their bit width plus one continuation bit.
        let num_masked_bits = if max_field_number > 15 {
            log2_floor_non_zero(max_field_number as u32) + 2
        } else {
            4
        };

        Ok(MessageLayout {
            has_bit_idx,
            num_has_bits,
            aux_idx,
            num_aux,
            max_field_number,
            num_masked: 1usize << num_masked_bits,
        })
    }

    /// Presence-bit index of a singular non-message field, by field number.
    pub fn has_bit(&self, number: i32) -> Option<usize> {
        self.has_bit_idx.get(&number).copied()
    }

    /// Index into the aux table of a message-typed field, by field number.
    pub fn aux_index(&self, number: i32) -> Option<usize> {
        self.aux_idx.get(&number).copied()
    }

    pub fn num_has_bits(&self) -> usize {
        self.num_has_bits
    }

    /// 32-bit words backing the presence bits.
    pub fn presence_words(&self) -> usize {
        self.num_has_bits.div_ceil(32)
    }

    pub fn num_aux(&self) -> usize {
        self.num_aux
    }

    pub fn max_field_number(&self) -> i32 {
        self.max_field_number
    }

    /// Size of the dense field-number-indexed decode array.
    pub fn num_decode_entries(&self) -> usize {
        self.max_field_number as usize + 1
    }

    /// Size of the masked-tag window.
    pub fn num_masked(&self) -> usize {
        self.num_masked
    }

    /// Tag mask applied by the runtime: `(num_masked - 1) << 3`.
    pub fn mask(&self) -> u16 {
        ((self.num_masked - 1) << 3) as u16
    }
}

/// Field number a masked-window slot stands for. The window indexes the
/// masked first two bytes of the varint tag shifted right by the wire-type
/// bits: the low nibble of the field number, a continuation bit, and the
/// continuation byte's payload. Without the continuation bit the high bits
/// are trailing stream data, so only the low nibble identifies the field.
pub fn implied_field_number(slot: usize) -> usize {
    (slot & 15) | (((slot >> 5) << 4) * ((slot >> 4) & 1))
}

fn log2_floor_non_zero(n: u32) -> u32 {
    debug_assert!(n != 0);
    31 - n.leading_zeros()
}
