#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct SequenceIdGenerator {
    current: u16,
}

impl SequenceIdGenerator {
    pub(crate) fn new() -> Self {
        SequenceIdGenerator { current: 0 }
    }

    pub(crate) fn generate(&mut self) -> u16 {
        let id = self.current;
        self.current = self.current.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around() {
        let mut ids = SequenceIdGenerator {
            current: u16::MAX,
        };
        assert_eq!(ids.generate(), u16::MAX);
        assert_eq!(ids.generate(), 0);
        assert_eq!(ids.generate(), 1);
    }
}
