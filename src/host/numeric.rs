use crate::guest::MagicNumber;

/// Answers `mosaic.magic_number` with a configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMagic(pub i32);

impl MagicNumber for FixedMagic {
    fn magic_number(&mut self) -> i32 {
        tracing::trace!(value = self.0, "magic_number called");
        self.0
    }
}
