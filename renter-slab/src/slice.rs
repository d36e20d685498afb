//! Slice and offset arithmetic
//!
//! Pure functions mapping an object-level byte range onto the slices that
//! hold it.

use renter_core::{RenterError, Result, Slice};

/// Total number of bytes described by `slices`
pub fn total_size(slices: &[Slice]) -> u64 {
    slices.iter().map(|s| s.length as u64).sum()
}

/// Clip `slices` to the byte range `[offset, offset + length)`
///
/// Slices that fall entirely outside the range are dropped; the first and
/// last remaining slices are trimmed. A zero-length range yields no slices.
pub fn slices_in_range(slices: &[Slice], offset: u64, length: u64) -> Result<Vec<Slice>> {
    let size = total_size(slices);
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= size)
        .ok_or(RenterError::RangeOutOfBounds {
            offset,
            length,
            size,
        })?;

    let mut clipped = Vec::new();
    if length == 0 {
        return Ok(clipped);
    }

    let mut pos = 0u64;
    for slice in slices {
        let slice_start = pos;
        let slice_end = pos + slice.length as u64;
        pos = slice_end;

        if slice_end <= offset || slice.length == 0 {
            continue;
        }
        if slice_start >= end {
            break;
        }

        let from = offset.max(slice_start) - slice_start;
        let to = end.min(slice_end) - slice_start;
        let mut s = slice.clone();
        s.offset += from as u32;
        s.length = (to - from) as u32;
        clipped.push(s);
    }

    Ok(clipped)
}
