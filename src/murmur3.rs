//! Murmur3 Hash Rust Implementation
//!
//! The x86 128-bit variant, adapted from the `murmur3` package <https://docs.rs/murmur3/latest/murmur3/>. This version works over a byte slice in one pass and has no dependency on the standard library.

const C1: u32 = 0x239b_961b;
const C2: u32 = 0xab0e_9789;
const C3: u32 = 0x38b3_4ae5;
const C4: u32 = 0xa1e3_8b93;
const C5: u32 = 0x561c_cd1b;
const C6: u32 = 0x0bca_a747;
const C7: u32 = 0x96cd_1c35;
const C8: u32 = 0x32ac_3b17;
const M: u32 = 5;

/// Lane constants as (multiplier, next multiplier, rotation) for k1..k4
const LANES: [(u32, u32, u32); 4] = [(C1, C2, 15), (C2, C3, 16), (C3, C4, 17), (C4, C1, 18)];

/// Internal mixing operation
fn fmix32(k: u32) -> u32 {
    let mut tmp = k;
    tmp ^= tmp >> 16;
    tmp = tmp.wrapping_mul(0x85eb_ca6b);
    tmp ^= tmp >> 13;
    tmp = tmp.wrapping_mul(0xc2b2_ae35);
    tmp ^= tmp >> 16;
    tmp
}

/// Scramble one 32-bit lane of input before it is folded into the state
#[inline]
fn scramble(k: u32, lane: usize) -> u32 {
    let (mul, next, rot) = LANES[lane];
    k.wrapping_mul(mul).rotate_left(rot).wrapping_mul(next)
}

#[inline]
fn read_lanes(block: &[u8]) -> [u32; 4] {
    let mut lanes = [0u32; 4];
    for (lane, word) in lanes.iter_mut().zip(block.chunks_exact(4)) {
        *lane = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }
    lanes
}

/// Murmur3 x86_128 over `source` with the given seed
///
/// The result packs h1 in the low 32 bits through h4 in the high 32 bits, matching the byte order of the reference implementation's output buffer.
pub fn murmur3_x86_128(source: &[u8], seed: u32) -> u128 {
    let mut h = [seed; 4];

    let mut blocks = source.chunks_exact(16);
    for block in &mut blocks {
        let k = read_lanes(block);
        h[0] ^= scramble(k[0], 0);
        h[0] = h[0]
            .rotate_left(19)
            .wrapping_add(h[1])
            .wrapping_mul(M)
            .wrapping_add(C5);
        h[1] ^= scramble(k[1], 1);
        h[1] = h[1]
            .rotate_left(17)
            .wrapping_add(h[2])
            .wrapping_mul(M)
            .wrapping_add(C6);
        h[2] ^= scramble(k[2], 2);
        h[2] = h[2]
            .rotate_left(15)
            .wrapping_add(h[3])
            .wrapping_mul(M)
            .wrapping_add(C7);
        h[3] ^= scramble(k[3], 3);
        h[3] = h[3]
            .rotate_left(13)
            .wrapping_add(h[0])
            .wrapping_mul(M)
            .wrapping_add(C8);
    }

    // Zero padding the tail is equivalent to the reference's byte-by-byte switch, as long as
    // a lane is only mixed in when at least one of its bytes is real input.
    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut buf = [0u8; 16];
        buf[..tail.len()].copy_from_slice(tail);
        let k = read_lanes(&buf);
        for lane in (0..4).rev() {
            if tail.len() > lane * 4 {
                h[lane] ^= scramble(k[lane], lane);
            }
        }
    }

    let len = source.len() as u32;
    for state in h.iter_mut() {
        *state ^= len;
    }
    avalanche(&mut h);
    for state in h.iter_mut() {
        *state = fmix32(*state);
    }
    avalanche(&mut h);

    ((h[3] as u128) << 96) | ((h[2] as u128) << 64) | ((h[1] as u128) << 32) | h[0] as u128
}

#[inline]
fn avalanche(h: &mut [u32; 4]) {
    h[0] = h[0].wrapping_add(h[1]).wrapping_add(h[2]).wrapping_add(h[3]);
    h[1] = h[1].wrapping_add(h[0]);
    h[2] = h[2].wrapping_add(h[0]);
    h[3] = h[3].wrapping_add(h[0]);
}

/* -------------------- Unit Tests -------------------- */
