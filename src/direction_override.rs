//! RAII guard for the forced-drain direction flip (spec §4.2 step c).
//!
//! When one direction's detection has exhausted every chance while the other direction is still
//! undecided, the base spec force-drains the opposite direction's queue through the same
//! machinery before moving on. That drain has to run "as if" the queued bytes belonged to the
//! opposite direction's call, then restore the original direction bit no matter how the drain
//! exits -- including through an early `?` return. A scope guard makes that restoration
//! unconditional instead of relying on every exit path remembering to flip the bit back.

use crate::pdu::{Direction, PduFlags};

/// Temporarily overrides the direction encoded in a [`PduFlags`] value, restoring the original
/// direction bit(s) when dropped.
///
/// The base spec leaves open whether the restore should reinstate the exact original flags or
/// just the original direction; this implementation takes the conservative reading and restores
/// the flags bit-for-bit (`DESIGN.md` records this as a resolved open question).
pub struct DirectionOverride<'a> {
    original: PduFlags,
    current: &'a mut PduFlags,
}

impl<'a> DirectionOverride<'a> {
    /// Flips the direction bits of `*flags` to `new_dir`, keeping the non-direction bits
    /// (`Start`, `Gap`) unchanged, and returns a guard that restores the original value on drop.
    pub fn apply(flags: &'a mut PduFlags, new_dir: Direction) -> Self {
        let original = *flags;
        let extra = *flags & !(PduFlags::ToServer | PduFlags::ToClient);
        let dir_bits = match new_dir {
            Direction::ToServer => PduFlags::ToServer,
            Direction::ToClient => PduFlags::ToClient,
        };
        *flags = dir_bits | extra;
        DirectionOverride {
            original,
            current: flags,
        }
    }
}

impl<'a> Drop for DirectionOverride<'a> {
    fn drop(&mut self) {
        *self.current = self.original;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_original_flags_on_drop() {
        let mut flags = PduFlags::for_direction(Direction::ToServer, true, false);
        {
            let _guard = DirectionOverride::apply(&mut flags, Direction::ToClient);
            assert_eq!(flags.direction(), Some(Direction::ToClient));
            assert!(flags.contains(PduFlags::Start));
        }
        assert_eq!(flags.direction(), Some(Direction::ToServer));
        assert!(flags.contains(PduFlags::Start));
    }
}
