type SequenceNumberInnerType = u16;

/// ICMP echo sequence number. Within one run every target owns exactly one.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SequenceNumber(SequenceNumberInnerType);

impl SequenceNumber {
    fn start_value_inner_type() -> SequenceNumberInnerType {
        // ICMP sequence numbers start from 1.
        SequenceNumberInnerType::from(1u8)
    }

    pub fn start_value() -> SequenceNumber {
        SequenceNumber(Self::start_value_inner_type())
    }

    pub fn max_value() -> SequenceNumberInnerType {
        SequenceNumberInnerType::MAX
    }

    /// Number of distinct sequence numbers available to one run.
    pub(crate) fn capacity() -> usize {
        usize::from(Self::max_value() - Self::start_value_inner_type()) + 1
    }

    /// Sequence number for the target at `index` (0-based, input order).
    pub(crate) fn from_index(index: usize) -> Option<SequenceNumber> {
        let value = SequenceNumberInnerType::try_from(index).ok()?.checked_add(Self::start_value_inner_type())?;
        Some(SequenceNumber(value))
    }

    /// Inverse of [`SequenceNumber::from_index`].
    pub(crate) fn index(self) -> Option<usize> {
        usize::from(self.0).checked_sub(usize::from(Self::start_value_inner_type()))
    }
}

impl From<SequenceNumber> for SequenceNumberInnerType {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<SequenceNumberInnerType> for SequenceNumber {
    fn from(value: SequenceNumberInnerType) -> Self {
        SequenceNumber(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_covers_all_non_zero_values() {
        assert_eq!(65535, SequenceNumber::capacity());
    }

    #[test]
    fn from_index_starts_at_one() {
        assert_eq!(Some(SequenceNumber::start_value()), SequenceNumber::from_index(0));
        assert_eq!(Some(SequenceNumber::from(u16::MAX)), SequenceNumber::from_index(65534));
        assert_eq!(None, SequenceNumber::from_index(65535));
    }

    #[test]
    fn index_is_inverse_of_from_index() {
        let sequence_number = SequenceNumber::from_index(41).unwrap();
        assert_eq!(Some(41), sequence_number.index());
        assert_eq!(None, SequenceNumber::from(0).index());
    }
}
