//! Streamed clip decoding
//!
//! The streamed clip is a run of frames: `f32 time`, `u32 key_count`, then
//! `key_count` keys of `u32 index`, three `f32` Hermite coefficients and an
//! `f32` value. In-slopes are not stored; they are recovered afterwards
//! from the nearest earlier key on the same curve.

use sekai_asset_core::{BinaryReader, ByteOrder, Result};

/// Lower bound for the time delta of the in-slope back-solve
pub const MIN_DELTA_TIME: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamedKey {
    pub index: u32,
    pub coeff: [f64; 3],
    pub value: f64,
    pub in_slope: f64,
    pub out_slope: f64,
}

impl StreamedKey {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let index = reader.read_u32()?;
        let coeff = [
            reader.read_f32()? as f64,
            reader.read_f32()? as f64,
            reader.read_f32()? as f64,
        ];
        let value = reader.read_f32()? as f64;
        Ok(Self {
            index,
            coeff,
            value,
            in_slope: 0.0,
            out_slope: coeff[2],
        })
    }

    /// In-slope of `next`, reached `dx` seconds after this key
    ///
    /// A key without coefficients holds its value, reported as `+inf`.
    pub fn next_in_slope(&self, dx: f64, next: &StreamedKey) -> f64 {
        if self.coeff.iter().all(|&c| c == 0.0) {
            return f64::INFINITY;
        }
        let dx = dx.max(MIN_DELTA_TIME);
        let dy = next.value - self.value;
        let d1 = self.out_slope * dx;
        let d2 = 3.0 * dy - 2.0 * d1 - self.coeff[1] * dx * dx;
        d2 / dx
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamedFrame {
    pub time: f64,
    pub keys: Vec<StreamedKey>,
}

/// Decode the words of `m_StreamedClip.data` into frames with in-slopes filled
pub fn decode_streamed(words: &[u32]) -> Result<Vec<StreamedFrame>> {
    // words are reinterpreted, so any fixed byte order works as long as both sides agree
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut reader = BinaryReader::new(&bytes, ByteOrder::Little);

    let mut frames = Vec::new();
    while reader.remaining() > 0 {
        let time = reader.read_f32()? as f64;
        let key_count = reader.read_u32()? as usize;
        let mut keys = Vec::with_capacity(key_count.min(reader.remaining() / 20));
        for _ in 0..key_count {
            keys.push(StreamedKey::read(&mut reader)?);
        }
        if time < 0.0 {
            continue;
        }
        frames.push(StreamedFrame { time, keys });
    }

    solve_in_slopes(&mut frames);
    tracing::trace!(frames = frames.len(), "decoded streamed clip");
    Ok(frames)
}

/// Quadratic in the number of frames; clips are short enough for this not to matter
fn solve_in_slopes(frames: &mut [StreamedFrame]) {
    let last = frames.len().saturating_sub(1);
    for k in 2..last {
        for key in 0..frames[k].keys.len() {
            let index = frames[k].keys[key].index;
            let slope = (1..k).rev().find_map(|f| {
                let previous = frames[f].keys.iter().find(|x| x.index == index)?;
                let dx = frames[k].time - frames[f].time;
                Some(previous.next_in_slope(dx, &frames[k].keys[key]))
            });
            if let Some(slope) = slope {
                frames[k].keys[key].in_slope = slope;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_words(time: f32, keys: &[(u32, [f32; 3], f32)]) -> Vec<u32> {
        let mut words = vec![time.to_bits(), keys.len() as u32];
        for (index, coeff, value) in keys {
            words.push(*index);
            words.extend(coeff.iter().map(|c| c.to_bits()));
            words.push(value.to_bits());
        }
        words
    }

    fn key(index: u32, coeff: [f64; 3], value: f64) -> StreamedKey {
        StreamedKey {
            index,
            coeff,
            value,
            in_slope: 0.0,
            out_slope: coeff[2],
        }
    }

    #[test]
    fn test_decode_frames() {
        let mut words = frame_words(-1.0, &[(0, [0.0; 3], 9.0)]);
        words.extend(frame_words(0.0, &[(0, [0.0, 0.0, 0.5], 1.0), (1, [0.0; 3], 2.0)]));
        words.extend(frame_words(0.5, &[(1, [0.0; 3], 3.0)]));

        let frames = decode_streamed(&words).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].time, 0.0);
        assert_eq!(frames[0].keys.len(), 2);
        assert_eq!(frames[0].keys[0].out_slope, 0.5);
        assert_eq!(frames[1].keys[0].value, 3.0);
    }

    #[test]
    fn test_truncated_key() {
        let mut words = frame_words(0.0, &[(0, [0.0; 3], 1.0)]);
        words.pop();
        assert!(decode_streamed(&words).is_err());
    }

    #[test]
    fn test_next_in_slope() {
        let previous = key(0, [0.0, 2.0, 1.0], 0.0);
        let next = key(0, [0.0; 3], 1.0);
        // 3*1 - 2*(1*0.5) - 2*0.25 = 1.5, over 0.5
        assert_eq!(previous.next_in_slope(0.5, &next), 3.0);

        let held = key(0, [0.0; 3], 0.0);
        assert_eq!(held.next_in_slope(0.5, &next), f64::INFINITY);
    }

    #[test]
    fn test_next_in_slope_clamps_delta() {
        let previous = key(0, [0.0, 0.0, 0.0001], 0.0);
        let next = key(0, [0.0; 3], 0.0);
        let slope = previous.next_in_slope(0.0, &next);
        assert!((slope - (-2.0 * 0.0001)).abs() < 1e-12);
    }

    #[test]
    fn test_back_solve_skips_edges() {
        let keys = |value: f32| vec![(0u32, [0.0f32, 0.0, 1.0], value)];
        let mut words = Vec::new();
        for (i, value) in [0.0f32, 1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            words.extend(frame_words(i as f32, &keys(*value)));
        }
        let frames = decode_streamed(&words).unwrap();

        assert_eq!(frames[0].keys[0].in_slope, 0.0);
        assert_eq!(frames[1].keys[0].in_slope, 0.0);
        assert_eq!(frames[4].keys[0].in_slope, 0.0);
        // dy = 1, d1 = 1 over dx = 1
        assert_eq!(frames[2].keys[0].in_slope, 1.0);
        assert_eq!(frames[3].keys[0].in_slope, 1.0);
    }

    #[test]
    fn test_back_solve_uses_nearest_matching_frame() {
        let mut words = frame_words(0.0, &[(7, [0.0, 0.0, 1.0], 0.0)]);
        words.extend(frame_words(1.0, &[(7, [0.0, 0.0, 0.0], 5.0)]));
        words.extend(frame_words(2.0, &[(8, [0.0, 0.0, 1.0], 0.0)]));
        words.extend(frame_words(3.0, &[(7, [0.0; 3], 6.0)]));
        words.extend(frame_words(4.0, &[(7, [0.0; 3], 6.0)]));
        let frames = decode_streamed(&words).unwrap();

        // frame 1 holds its value, so the segment into frame 3 is a step
        assert_eq!(frames[3].keys[0].in_slope, f64::INFINITY);
    }
}
