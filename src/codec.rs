//! # Wire Codec
//!
//! Deterministic binary frame used to ship partial results from a partition
//! to the reduce coordinator, and final histograms onwards.
//!
//! ## Frame Layout
//!
//! All fixed-width scalars are big-endian. Varints are unsigned LEB128
//! (7-bit groups, least significant first, high bit = continuation).
//!
//! ```text
//! order_policy_id : u8
//! interval        : f64        bucket width
//! nbins           : i32        0 for interval mode
//! entry_count     : varint
//! integral        : f64
//! mean            : f64
//! rms             : f64
//! underflow       : f64
//! overflow        : f64
//! entry_count × {
//!     key         : i64        sentinels as i64::MIN / i64::MAX
//!     count       : varint
//!     sum         : f64
//!     error       : f64        sqrt(sum_of_squares)
//! }
//! mode trailer    : offset:f64               (nbins == 0)
//!                 | xmin:f64, xmax:f64       (nbins > 0)
//! ```
//!
//! Only the square root of `sum_of_squares` is transmitted; decoding squares
//! it back. Decoding rejects frames whose binning mode fails validation,
//! whose fixed-range header width disagrees with the trailer, or that carry
//! the same bucket key twice. The mode trailer lets a frame decode to the exact
//! [`BinningMode`] it was built under, so decoded partials still pass the
//! reduce compatibility check.

use crate::accumulator::BucketEntry;
use crate::binning::{BinningMode, BucketKey};
use crate::error::CodecError;
use crate::histogram::{HistogramResult, PartialResult, Statistics};
use crate::order::OrderPolicy;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashSet;

/// Fixed header size, excluding the entry-count varint.
const HEADER_FIXED_LEN: usize = 1 + 8 + 4 + 5 * 8;
/// Smallest possible encoded entry: key, one-byte count, sum, error.
const MIN_ENTRY_LEN: usize = 8 + 1 + 8 + 8;

/// Encode a partition's partial result, with its own statistics in the header.
pub fn encode_partial(partial: &PartialResult, order: OrderPolicy) -> Bytes {
    let stats = partial.statistics();
    write_frame(order, &partial.mode(), &stats, partial.entries())
}

/// Encode a reduced histogram.
pub fn encode_histogram(histogram: &HistogramResult) -> Bytes {
    write_frame(
        histogram.order(),
        &histogram.mode(),
        histogram.statistics(),
        histogram.entries(),
    )
}

/// Decode a frame into a partial result. Header statistics are discarded;
/// they are recomputed at reduce time.
pub fn decode_partial(frame: &[u8]) -> Result<(PartialResult, OrderPolicy), CodecError> {
    let decoded = read_frame(frame)?;
    Ok((
        PartialResult::new(decoded.mode, decoded.entries),
        decoded.order,
    ))
}

/// Decode a frame into a histogram, keeping the transmitted statistics.
pub fn decode_histogram(frame: &[u8]) -> Result<HistogramResult, CodecError> {
    let decoded = read_frame(frame)?;
    let total_count = decoded
        .entries
        .iter()
        .filter(|entry| !entry.key.is_sentinel())
        .map(BucketEntry::count)
        .sum();
    let stats = Statistics {
        total_count,
        ..decoded.stats
    };
    Ok(HistogramResult::from_parts(
        decoded.mode,
        decoded.order,
        decoded.entries,
        stats,
    ))
}

fn write_frame(
    order: OrderPolicy,
    mode: &BinningMode,
    stats: &Statistics,
    entries: &[BucketEntry],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_FIXED_LEN + 10 + entries.len() * 34 + 16);

    buf.put_u8(order.id());
    buf.put_f64(mode.bin_width());
    buf.put_i32(mode.nbins());
    put_varint(&mut buf, entries.len() as u64);
    buf.put_f64(stats.integral);
    buf.put_f64(stats.mean);
    buf.put_f64(stats.rms);
    buf.put_f64(stats.underflow);
    buf.put_f64(stats.overflow);

    for entry in entries {
        buf.put_i64(entry.key.to_wire());
        put_varint(&mut buf, entry.count());
        buf.put_f64(entry.sum());
        buf.put_f64(entry.sum_of_squares().sqrt());
    }

    match *mode {
        BinningMode::Interval { offset, .. } => buf.put_f64(offset),
        BinningMode::FixedRange { xmin, xmax, .. } => {
            buf.put_f64(xmin);
            buf.put_f64(xmax);
        }
    }

    buf.freeze()
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

struct DecodedFrame {
    order: OrderPolicy,
    mode: BinningMode,
    stats: Statistics,
    entries: Vec<BucketEntry>,
}

/// Bounds-checked cursor over a frame. `bytes::Buf` getters panic on short
/// input, so every read is preceded by `ensure`.
struct FrameReader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::Truncated {
                offset: self.offset(),
                needed: needed - self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    fn f64(&mut self) -> Result<f64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn varint(&mut self, bits: u32) -> Result<u64, CodecError> {
        let start = self.offset();
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            let chunk = (byte & 0x7f) as u64;
            if shift >= bits || (bits - shift < 7 && chunk >> (bits - shift) != 0) {
                return Err(CodecError::VarintOverflow { offset: start, bits });
            }
            value |= chunk << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }
}

fn read_frame(frame: &[u8]) -> Result<DecodedFrame, CodecError> {
    let mut reader = FrameReader::new(frame);

    let order = OrderPolicy::from_id(reader.u8()?)?;
    let width = reader.f64()?;
    let nbins = reader.i32()?;
    if nbins < 0 {
        return Err(CodecError::InvalidBinCount(nbins));
    }
    let entry_count = reader.varint(32)? as usize;
    let integral = reader.f64()?;
    let mean = reader.f64()?;
    let rms = reader.f64()?;
    let underflow = reader.f64()?;
    let overflow = reader.f64()?;

    let with_sentinels = nbins > 0;
    // Never trust the declared count for the allocation size.
    let capacity = entry_count.min(reader.buf.remaining() / MIN_ENTRY_LEN);
    let mut entries = Vec::with_capacity(capacity);
    let mut seen = HashSet::with_capacity(capacity);
    for _ in 0..entry_count {
        let raw_key = reader.i64()?;
        if !seen.insert(raw_key) {
            return Err(CodecError::DuplicateKey(raw_key));
        }
        let key = BucketKey::from_wire(raw_key, with_sentinels);
        let count = reader.varint(64)?;
        let sum = reader.f64()?;
        let error = reader.f64()?;
        entries.push(BucketEntry::new(key, count, sum, error * error));
    }

    let mode = if with_sentinels {
        let xmin = reader.f64()?;
        let xmax = reader.f64()?;
        BinningMode::FixedRange { nbins, xmin, xmax }
    } else {
        BinningMode::Interval {
            interval: width,
            offset: reader.f64()?,
        }
    };

    if reader.buf.has_remaining() {
        return Err(CodecError::TrailingBytes(reader.buf.remaining()));
    }

    mode.validate().map_err(|e| CodecError::InvalidMode(e.to_string()))?;
    if with_sentinels && width != mode.bin_width() {
        return Err(CodecError::InvalidMode(format!(
            "header width {} does not match {}",
            width, mode
        )));
    }

    Ok(DecodedFrame {
        order,
        mode,
        stats: Statistics {
            total_count: 0,
            integral,
            mean,
            rms,
            underflow,
            overflow,
        },
        entries,
    })
}
