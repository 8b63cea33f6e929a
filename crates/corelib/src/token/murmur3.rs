//! Murmur3 x64/128 hash, bit-compatible with the store's partitioner.
//!
//! The store hashes partition keys with its own port of MurmurHash3 whose
//! tail handling sign-extends the trailing bytes. Keys whose length is not a
//! multiple of 16 and whose tail holds bytes >= 0x80 therefore hash
//! differently from the reference C implementation, and routing must
//! reproduce that exactly.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[inline]
fn block(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Tail byte widened the way the store does it (sign-extended).
#[inline]
fn tail(data: &[u8], i: usize) -> u64 {
    data[i] as i8 as i64 as u64
}

/// Computes the 128-bit Murmur3 hash with seed 0 and returns both halves.
pub fn murmur3_x64_128(data: &[u8]) -> (i64, i64) {
    let len = data.len();
    let nblocks = len / 16;

    let mut h1: u64 = 0;
    let mut h2: u64 = 0;

    for i in 0..nblocks {
        let mut k1 = block(data, i * 16);
        let mut k2 = block(data, i * 16 + 8);

        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(31);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;

        h1 = h1.rotate_left(27);
        h1 = h1.wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2);
        k2 = k2.rotate_left(33);
        k2 = k2.wrapping_mul(C1);
        h2 ^= k2;

        h2 = h2.rotate_left(31);
        h2 = h2.wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    let base = nblocks * 16;
    let rem = len & 15;
    let mut k1: u64 = 0;
    let mut k2: u64 = 0;

    if rem > 8 {
        for i in (8..rem).rev() {
            k2 ^= tail(data, base + i) << ((i - 8) * 8);
        }
        k2 = k2.wrapping_mul(C2);
        k2 = k2.rotate_left(33);
        k2 = k2.wrapping_mul(C1);
        h2 ^= k2;
    }

    if rem > 0 {
        for i in (0..rem.min(8)).rev() {
            k1 ^= tail(data, base + i) << (i * 8);
        }
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(31);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= len as u64;
    h2 ^= len as u64;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1 as i64, h2 as i64)
}
