//! Channel index maps for per-pixel channel reordering.

use std::fmt;

use crate::error::{CoreResult, Error};

/// Source channel for each of the four output channel slots.
///
/// Output slot `i` receives source channel `map[i]`. Used for RGBA to BGRA
/// swaps and ARGB captures.
///
/// ```rust
/// use vpipe_core::ChannelMap;
///
/// let swap = ChannelMap::bgra();
/// assert_eq!(swap.apply(&[10u8, 20, 30, 40]), [30, 20, 10, 40]);
/// assert_eq!(swap.inverse(), Some(swap));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMap {
    /// Source channel written to output red.
    pub red: u8,
    /// Source channel written to output green.
    pub green: u8,
    /// Source channel written to output blue.
    pub blue: u8,
    /// Source channel written to output alpha.
    pub alpha: u8,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl ChannelMap {
    /// Creates a validated map.
    pub fn new(red: u8, green: u8, blue: u8, alpha: u8) -> CoreResult<Self> {
        let map = Self { red, green, blue, alpha };
        map.validate()?;
        Ok(map)
    }

    /// Pass-through map.
    pub const fn identity() -> Self {
        Self { red: 0, green: 1, blue: 2, alpha: 3 }
    }

    /// Red/blue swap (RGBA <-> BGRA).
    pub const fn bgra() -> Self {
        Self { red: 2, green: 1, blue: 0, alpha: 3 }
    }

    /// Reads ARGB pixels into RGBA order.
    pub const fn argb_to_rgba() -> Self {
        Self { red: 1, green: 2, blue: 3, alpha: 0 }
    }

    /// Reads RGBA pixels into ARGB order.
    pub const fn rgba_to_argb() -> Self {
        Self { red: 3, green: 0, blue: 1, alpha: 2 }
    }

    /// Checks every index is within `0..=3`.
    pub fn validate(&self) -> CoreResult<()> {
        for index in self.indices_u8() {
            if index > 3 {
                return Err(Error::InvalidChannelMap { index });
            }
        }
        Ok(())
    }

    fn indices_u8(&self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    /// Source indices in output slot order.
    #[inline]
    pub fn indices(&self) -> [usize; 4] {
        self.indices_u8().map(usize::from)
    }

    /// Whether every source channel is used exactly once.
    pub fn is_permutation(&self) -> bool {
        let mut seen = [false; 4];
        for index in self.indices() {
            if index > 3 || seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }

    /// Map undoing this one, if it is a permutation.
    pub fn inverse(&self) -> Option<Self> {
        if !self.is_permutation() {
            return None;
        }
        let mut inv = [0u8; 4];
        for (slot, index) in self.indices().into_iter().enumerate() {
            inv[index] = slot as u8;
        }
        Some(Self {
            red: inv[0],
            green: inv[1],
            blue: inv[2],
            alpha: inv[3],
        })
    }

    /// Applies the map to a single four-channel pixel.
    #[inline]
    pub fn apply<T: Copy>(&self, px: &[T]) -> [T; 4] {
        let idx = self.indices();
        [px[idx[0]], px[idx[1]], px[idx[2]], px[idx[3]]]
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [char; 4] = ['r', 'g', 'b', 'a'];
        for index in self.indices() {
            let c = NAMES.get(index).copied().unwrap_or('?');
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(ChannelMap::new(0, 1, 2, 3).is_ok());
        assert_eq!(
            ChannelMap::new(0, 1, 4, 3),
            Err(Error::InvalidChannelMap { index: 4 })
        );
    }

    #[test]
    fn test_argb_pair_are_inverses() {
        assert_eq!(ChannelMap::argb_to_rgba().inverse(), Some(ChannelMap::rgba_to_argb()));
        let px = [255u8, 1, 2, 3]; // A R G B
        assert_eq!(ChannelMap::argb_to_rgba().apply(&px), [1, 2, 3, 255]);
    }

    #[test]
    fn test_non_permutation_has_no_inverse() {
        let map = ChannelMap { red: 0, green: 0, blue: 2, alpha: 3 };
        assert!(!map.is_permutation());
        assert!(map.inverse().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelMap::bgra().to_string(), "bgra");
        assert_eq!(ChannelMap::identity().to_string(), "rgba");
    }
}
