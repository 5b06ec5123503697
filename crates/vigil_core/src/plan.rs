//! Scan block sizing.
//!
//! Reading one native sector per syscall is slow on modern SSDs, so the plan
//! groups `scale` sectors into one scan block. The product stays a power of
//! two so that every block offset and length remains direct-I/O aligned.

use serde::Serialize;
use std::ops::Range;

use crate::error::PlanError;
use crate::types::{BlockIndex, Geometry};

/// Native sectors per scan block when no scale factor is given.
pub const DEFAULT_SCALE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockPlan {
    geometry: Geometry,
    scale: u32,
    effective_block_size: u32,
    total_blocks: u64,
}

impl BlockPlan {
    /// Derives the plan for `geometry`. Pure: equal inputs give equal plans.
    pub fn new(geometry: Geometry, scale: Option<u32>) -> Result<Self, PlanError> {
        let scale = scale.unwrap_or(DEFAULT_SCALE);

        if scale == 0 {
            return Err(PlanError::ZeroScale);
        }
        if !scale.is_power_of_two() {
            return Err(PlanError::ScaleNotPowerOfTwo(scale));
        }

        let native_block_size = geometry.native_block_size();
        let effective_block_size =
            native_block_size
                .checked_mul(scale)
                .ok_or(PlanError::Overflow {
                    native_block_size,
                    scale,
                })?;

        let total_blocks = geometry.total_bytes() / u64::from(effective_block_size);

        Ok(Self {
            geometry,
            scale,
            effective_block_size,
            total_blocks,
        })
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub const fn effective_block_size(&self) -> u32 {
        self.effective_block_size
    }

    #[inline]
    #[must_use]
    pub const fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    #[inline]
    #[must_use]
    pub const fn offset_of(&self, index: BlockIndex) -> u64 {
        index * self.effective_block_size as u64
    }

    /// Bytes covered by the scan.
    #[must_use]
    pub const fn covered_bytes(&self) -> u64 {
        self.total_blocks * self.effective_block_size as u64
    }

    /// Bytes past the last whole block; never scanned.
    #[must_use]
    pub const fn trailing_bytes(&self) -> u64 {
        self.geometry.total_bytes() - self.covered_bytes()
    }

    /// Splits `[0, total_blocks)` into consecutive waves of `width` blocks.
    /// The last wave may be narrower.
    #[must_use]
    pub fn waves(&self, width: usize) -> Waves {
        Waves {
            next: 0,
            end: self.total_blocks,
            width: width.max(1) as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Waves {
    next: u64,
    end: u64,
    width: u64,
}

impl Iterator for Waves {
    type Item = Range<BlockIndex>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let start = self.next;
        self.next = start.saturating_add(self.width).min(self.end);
        Some(start..self.next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next).div_ceil(self.width);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
