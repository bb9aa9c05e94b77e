//! USM payload masks
//!
//! A 128-bit key expands into a 32-byte seed table. Video payloads are
//! unmasked in two passes (a feedback pass over `[0x100, size)`, then the
//! first 0x100 bytes with a mask perturbed by the freshly decoded bytes);
//! audio payloads are XORed from 0x140 on.

use sekai_asset_core::{AssetError, Result};
use std::fmt;
use std::str::FromStr;

pub const MASK_LEN: usize = 0x20;

/// Video payloads carry a 0x40-byte clear header
const VIDEO_BASE: usize = 0x40;
/// Masked video region must reach at least this size
const VIDEO_MIN_SIZE: usize = 0x200;
const VIDEO_HEAD: usize = 0x100;
const AUDIO_BASE: usize = 0x140;

const AUDIO_KEY: &[u8; 4] = b"URUC";

/// Decimal USM key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UsmKey(pub u128);

impl fmt::Debug for UsmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UsmKey(..)")
    }
}

impl FromStr for UsmKey {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u128>()
            .map(UsmKey)
            .map_err(|e| AssetError::format(format!("invalid USM key: {}", e)))
    }
}

impl From<u128> for UsmKey {
    fn from(key: u128) -> Self {
        UsmKey(key)
    }
}

/// Seed table derived from the key
pub fn seed_table(key: UsmKey) -> [u8; MASK_LEN] {
    let key1 = (key.0 & 0xFFFF_FFFF) as u32;
    let key2 = ((key.0 >> 64) & 0xFFFF_FFFF) as u32;
    let [k0, k1, k2, k3] = key1.to_le_bytes();
    let [_, k2b1, k2b2, _] = key2.to_le_bytes();

    let mut t = [0u8; MASK_LEN];
    t[0x00] = k0;
    t[0x01] = k1;
    t[0x02] = k2;
    t[0x03] = k3.wrapping_sub(0x34);
    t[0x04] = ((key2 & 0xF) as u8).wrapping_add(0xF9);
    t[0x05] = k2b1 ^ 0x13;
    t[0x06] = k2b2.wrapping_add(0x61);
    t[0x07] = t[0x00] ^ 0xFF;
    t[0x08] = t[0x02].wrapping_add(t[0x01]);
    t[0x09] = t[0x01].wrapping_sub(t[0x07]);
    t[0x0A] = t[0x02] ^ 0xFF;
    t[0x0B] = t[0x01] ^ 0xFF;
    t[0x0C] = t[0x0B].wrapping_add(t[0x09]);
    t[0x0D] = t[0x08].wrapping_sub(t[0x03]);
    t[0x0E] = t[0x0D] ^ 0xFF;
    t[0x0F] = t[0x0A].wrapping_sub(t[0x0B]);
    t[0x10] = t[0x08].wrapping_sub(t[0x0F]);
    t[0x11] = t[0x10] ^ t[0x07];
    t[0x12] = t[0x0F] ^ 0xFF;
    t[0x13] = t[0x03] ^ 0x10;
    t[0x14] = t[0x04].wrapping_sub(0x32);
    t[0x15] = t[0x05].wrapping_add(0xED);
    t[0x16] = t[0x06] ^ 0xF3;
    t[0x17] = t[0x13].wrapping_sub(t[0x0F]);
    t[0x18] = t[0x15].wrapping_add(t[0x07]);
    t[0x19] = 0x21u8.wrapping_sub(t[0x13]);
    t[0x1A] = t[0x14] ^ t[0x17];
    t[0x1B] = t[0x16].wrapping_add(t[0x16]);
    t[0x1C] = t[0x17].wrapping_add(0x44);
    t[0x1D] = t[0x03].wrapping_add(t[0x04]);
    t[0x1E] = t[0x05].wrapping_sub(t[0x16]);
    t[0x1F] = t[0x1D] ^ t[0x13];
    t
}

/// Video and audio masks for one key
#[derive(Clone, PartialEq, Eq)]
pub struct UsmMask {
    video1: [u8; MASK_LEN],
    video2: [u8; MASK_LEN],
    audio: [u8; MASK_LEN],
}

impl fmt::Debug for UsmMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsmMask").finish_non_exhaustive()
    }
}

impl UsmMask {
    pub fn new(key: UsmKey) -> Self {
        let t = seed_table(key);
        let mut video1 = [0u8; MASK_LEN];
        let mut video2 = [0u8; MASK_LEN];
        let mut audio = [0u8; MASK_LEN];
        for (i, &ti) in t.iter().enumerate() {
            video1[i] = ti;
            video2[i] = ti ^ 0xFF;
            audio[i] = if i & 1 == 1 {
                AUDIO_KEY[(i >> 1) & 3]
            } else {
                ti ^ 0xFF
            };
        }
        Self {
            video1,
            video2,
            audio,
        }
    }

    pub fn video_masks(&self) -> (&[u8; MASK_LEN], &[u8; MASK_LEN]) {
        (&self.video1, &self.video2)
    }

    pub fn audio_mask(&self) -> &[u8; MASK_LEN] {
        &self.audio
    }

    /// Unmask a video payload in place
    pub fn unmask_video(&self, content: &mut [u8]) {
        let size = content.len().saturating_sub(VIDEO_BASE);
        if size < VIDEO_MIN_SIZE {
            return;
        }
        let body = &mut content[VIDEO_BASE..];

        let mut mask = self.video2;
        for i in VIDEO_HEAD..size {
            let slot = i & 0x1F;
            body[i] ^= mask[slot];
            mask[slot] = body[i] ^ self.video2[slot];
        }

        let mut mask = self.video1;
        for i in 0..VIDEO_HEAD {
            let slot = i & 0x1F;
            mask[slot] ^= body[VIDEO_HEAD + i];
            body[i] ^= mask[slot];
        }
    }

    /// Unmask an audio payload in place
    pub fn unmask_audio(&self, content: &mut [u8]) {
        if content.len() <= AUDIO_BASE {
            return;
        }
        for (i, byte) in content[AUDIO_BASE..].iter_mut().enumerate() {
            *byte ^= self.audio[i & 0x1F];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: u128 = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210;

    fn video_fixture() -> Vec<u8> {
        (0..VIDEO_BASE + 0x240).map(|i| (i % 256) as u8).collect()
    }

    /// Inverse of `unmask_video`: the head pass only depends on plaintext
    fn mask_video(mask: &UsmMask, content: &mut [u8]) {
        let (video1, video2) = mask.video_masks();
        let size = content.len() - VIDEO_BASE;
        let body = &mut content[VIDEO_BASE..];

        let mut m = *video1;
        for i in 0..VIDEO_HEAD {
            m[i & 0x1F] ^= body[VIDEO_HEAD + i];
            body[i] ^= m[i & 0x1F];
        }
        let mut m = *video2;
        for i in VIDEO_HEAD..size {
            let plain = body[i];
            body[i] ^= m[i & 0x1F];
            m[i & 0x1F] = plain ^ video2[i & 0x1F];
        }
    }

    #[test]
    fn test_zero_key_seed_table() {
        let expected =
            hex::decode("000000ccf91361ff0001ffff0034cb0000ffffdcc70092dcff451b2420c58119")
                .unwrap();
        assert_eq!(seed_table(UsmKey(0)).to_vec(), expected);

        let mask = UsmMask::new(UsmKey(0));
        assert_eq!(
            &mask.audio_mask()[..6],
            &[0xFF, b'U', 0xFF, b'R', 0x06, b'U']
        );
    }

    #[test]
    fn test_seed_table_uses_both_key_halves() {
        let expected =
            hex::decode("1032544208de0cef8643abcd1044bbdea8472152d6cbff74bacfa2feb84adf18")
                .unwrap();
        assert_eq!(seed_table(UsmKey(KEY)).to_vec(), expected);
        assert_eq!(
            UsmMask::new(UsmKey(KEY)).audio_mask().to_vec(),
            hex::decode("ef55ab52f755f34379555452ef5544435755de522955004345555d5247552043")
                .unwrap()
        );
    }

    #[test]
    fn test_mask_is_deterministic() {
        assert_eq!(UsmMask::new(UsmKey(KEY)), UsmMask::new(UsmKey(KEY)));
        assert_ne!(UsmMask::new(UsmKey(KEY)), UsmMask::new(UsmKey(KEY + 1)));
    }

    #[test]
    fn test_unmask_video_known_output() {
        let mask = UsmMask::new(UsmKey(KEY));
        let mut content = video_fixture();
        mask.unmask_video(&mut content);

        assert_eq!(&content[..VIDEO_BASE], &video_fixture()[..VIDEO_BASE]);
        assert_eq!(content[0x40..0x48], [0xFF; 8]);
        assert_eq!(content[0x140..0x148], hex::decode("af8ce9feb364b557").unwrap()[..]);
        assert_eq!(content[content.len() - 8..], [0x20; 8]);
    }

    #[test]
    fn test_video_round_trip() {
        let mask = UsmMask::new(UsmKey(KEY));
        let plain = video_fixture();
        let mut content = plain.clone();
        mask_video(&mask, &mut content);
        assert_ne!(content, plain);
        mask.unmask_video(&mut content);
        assert_eq!(content, plain);
    }

    #[test]
    fn test_short_video_is_untouched() {
        let mask = UsmMask::new(UsmKey(KEY));
        let mut content = vec![7u8; VIDEO_BASE + VIDEO_MIN_SIZE - 1];
        mask.unmask_video(&mut content);
        assert!(content.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_unmask_audio_known_output() {
        let mask = UsmMask::new(UsmKey(KEY));
        let mut content: Vec<u8> = (0..0x160).map(|i| (i % 256) as u8).collect();
        mask.unmask_audio(&mut content);
        assert_eq!(
            content[0x138..0x148],
            hex::decode("38393a3b3c3d3e3faf14e911b310b504").unwrap()[..]
        );
        assert_eq!(content[content.len() - 4..], hex::decode("1b087e1c").unwrap()[..]);
    }

    #[test]
    fn test_key_parsing() {
        let key: UsmKey = "1234567890".parse().unwrap();
        assert_eq!(key, UsmKey(1_234_567_890));
        assert!("0x12".parse::<UsmKey>().is_err());
    }
}
