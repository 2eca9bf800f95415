use bytes::Bytes;
use ebml::{ElementSize, build_element, decode_element, decode_size, encode_size, ids};

const LENGTHS: [usize; 7] = [0, 126, 127, (1 << 14) - 1, 1 << 14, (1 << 21) - 1, 1 << 21];

const IDS: [u32; 6] = [
    ids::SIMPLE_BLOCK,
    ids::CODEC_PRIVATE,
    ids::TIMESTAMP_SCALE,
    ids::CLUSTER,
    ids::SEGMENT_UID,
    ids::EBML,
];

#[test]
fn element_round_trip_at_size_boundaries() {
    for &id in &IDS {
        for &len in &LENGTHS {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let encoded = build_element(id, &payload).unwrap();

            let (decoded, consumed) = decode_element(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded.id, id, "id 0x{id:X} len {len}");
            assert_eq!(decoded.size, ElementSize::Known(len as u64));
            assert_eq!(decoded.payload, Bytes::from(payload));
        }
    }
}

#[test]
fn size_vint_round_trip_up_to_largest_known_size() {
    let mut sizes = vec![0u64, 126, 127, (1 << 56) - 2];
    for bits in [14u32, 21, 28, 35, 42, 49] {
        sizes.push((1 << bits) - 2);
        sizes.push((1 << bits) - 1);
        sizes.push(1 << bits);
    }

    for size in sizes {
        let encoded = encode_size(size).unwrap();
        assert_ne!(
            decode_size(&encoded).unwrap().0,
            ElementSize::Unknown,
            "size {size} collided with the unknown marker"
        );
        assert_eq!(decode_size(&encoded).unwrap(), (ElementSize::Known(size), encoded.len()));
    }
}

#[test]
fn single_byte_sizes_never_emit_the_unknown_marker() {
    for size in 0..=127u64 {
        let encoded = encode_size(size).unwrap();
        assert_ne!(encoded, vec![0xFF]);
    }
}
