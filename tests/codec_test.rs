//! Fidelity tests for the object-graph codec: every supported value category must survive
//! `decode(encode(v))` unchanged, deduplication must be invisible to the decoded result even
//! when the cache table saturates, and malformed blobs must be rejected whole.

use borsh::{BorshDeserialize, BorshSerialize};
use rand::Rng;
use viewstate_rs::codec::{
    CodecError, FormatterRegistry, ObjectGraphCodec, TypeDescriptor, Value,
};

fn round_trip(value: Value) -> Value {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let bytes = codec.encode(&value).unwrap();
    let decoded = codec.decode(&bytes).unwrap();
    assert_eq!(decoded, value);
    decoded
}

#[test]
fn primitives_round_trip() {
    round_trip(Value::Null);
    round_trip(Value::Bool(true));
    round_trip(Value::Bool(false));
    round_trip(Value::U8(0));
    round_trip(Value::U8(255));
    round_trip(Value::I16(i16::MIN));
    round_trip(Value::I16(-1));
    round_trip(Value::I64(i64::MIN));
    round_trip(Value::I64(i64::MAX));
    round_trip(Value::Char('x'));
    round_trip(Value::Char('€'));
}

#[test]
fn i32_round_trips_across_the_byte_narrowing_boundary() {
    // Values representable in one byte take the short form on the wire; the rest do not.
    // Negative values must never be narrowed.
    for v in [0, 1, 127, 128, 255, 256, -1, -255, i32::MIN, i32::MAX] {
        round_trip(Value::I32(v));
    }
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let narrow = codec.encode(&Value::I32(255)).unwrap();
    let wide = codec.encode(&Value::I32(256)).unwrap();
    assert!(narrow.len() < wide.len());
}

#[test]
fn strings_round_trip() {
    round_trip(Value::String(String::new()));
    round_trip(Value::String("plain".to_string()));
    round_trip(Value::String("with \"quotes\" and \\backslashes\\".to_string()));
    round_trip(Value::String("pägeŧitle — ünicode".to_string()));
}

#[test]
fn compounds_round_trip() {
    round_trip(Value::pair(Value::I32(1), Value::Null));
    round_trip(Value::triplet(
        Value::String("a".to_string()),
        Value::pair(Value::Bool(true), Value::I64(9)),
        Value::Null,
    ));
    round_trip(Value::List(vec![
        Value::Null,
        Value::I32(300),
        Value::String("mixed".to_string()),
        Value::List(vec![Value::U8(1)]),
    ]));
    round_trip(Value::Map(vec![
        (Value::String("k1".to_string()), Value::I32(-5)),
        (
            Value::String("k2".to_string()),
            Value::Map(vec![(Value::I32(0), Value::Bool(false))]),
        ),
    ]));
}

#[test]
fn enums_types_and_converted_values_round_trip() {
    round_trip(Value::Type(TypeDescriptor::new("alignment")));
    round_trip(Value::Enum {
        ty: TypeDescriptor::new("alignment"),
        discriminant: 2,
    });
    round_trip(Value::Enum {
        ty: TypeDescriptor::new("flags"),
        discriminant: -1,
    });
    round_trip(Value::Converted {
        ty: TypeDescriptor::new("unit"),
        repr: "12px".to_string(),
    });
}

#[test]
fn arrays_round_trip_on_both_paths() {
    // Packed fast path: homogeneous primitive items.
    round_trip(Value::Array {
        elem: TypeDescriptor::new("i32"),
        items: vec![Value::I32(1), Value::I32(-200), Value::I32(70_000)],
    });
    round_trip(Value::Array {
        elem: TypeDescriptor::new("u8"),
        items: (0u8..16).map(Value::U8).collect(),
    });
    round_trip(Value::Array {
        elem: TypeDescriptor::new("i64"),
        items: vec![Value::I64(i64::MIN), Value::I64(0)],
    });
    // Element-wise path: structured elements.
    round_trip(Value::Array {
        elem: TypeDescriptor::new("label"),
        items: vec![
            Value::String("one".to_string()),
            Value::String("two".to_string()),
        ],
    });
    round_trip(Value::Array {
        elem: TypeDescriptor::new("pair"),
        items: vec![
            Value::pair(Value::I32(1), Value::Bool(true)),
            Value::pair(Value::I32(2), Value::Bool(false)),
        ],
    });
    // Declared primitive element type with non-conforming items still round-trips via the
    // element-wise path.
    round_trip(Value::Array {
        elem: TypeDescriptor::new("i32"),
        items: vec![Value::I32(1), Value::String("odd one out".to_string())],
    });
    round_trip(Value::Array {
        elem: TypeDescriptor::new("empty"),
        items: vec![],
    });
}

#[derive(BorshSerialize, BorshDeserialize, PartialEq, Debug)]
struct PagerSettings {
    page_size: u32,
    visible: bool,
    label: String,
}

#[test]
fn opaque_payloads_round_trip_through_borsh() {
    let settings = PagerSettings {
        page_size: 25,
        visible: true,
        label: "pager".to_string(),
    };
    let value = Value::opaque_from(&settings).unwrap();
    let decoded = round_trip(value);
    let recovered: PagerSettings = decoded.opaque_into().unwrap();
    assert_eq!(recovered, settings);
}

#[test]
fn repeated_strings_are_deduplicated_transparently() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);

    let repeated = Value::List(vec![
        Value::String("control-label".to_string()),
        Value::String("control-label".to_string()),
        Value::String("control-label".to_string()),
    ]);
    let distinct = Value::List(vec![
        Value::String("control-label".to_string()),
        Value::String("another-label".to_string()),
        Value::String("a-third-label".to_string()),
    ]);

    let repeated_bytes = codec.encode(&repeated).unwrap();
    let distinct_bytes = codec.encode(&distinct).unwrap();
    // Cache hits are written as a tag plus a 16-bit key, so repetition must pay off.
    assert!(repeated_bytes.len() < distinct_bytes.len());
    assert_eq!(codec.decode(&repeated_bytes).unwrap(), repeated);

    let repeated_types = Value::List(vec![
        Value::Type(TypeDescriptor::new("grid-row")),
        Value::Type(TypeDescriptor::new("grid-row")),
        Value::Enum {
            ty: TypeDescriptor::new("grid-row"),
            discriminant: 1,
        },
    ]);
    round_trip(repeated_types);
}

#[test]
fn dedup_cache_exhaustion_degrades_gracefully() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);

    // More distinct strings than the 16-bit key space admits, then repetitions from both
    // sides of the cap.
    let mut items: Vec<Value> = (0..40_000u32)
        .map(|i| Value::String(format!("s{}", i)))
        .collect();
    items.push(Value::String("s17".to_string()));
    items.push(Value::String("s39999".to_string()));
    items.push(Value::String("s39999".to_string()));
    let value = Value::List(items);

    let bytes = codec.encode(&value).unwrap();
    assert_eq!(codec.decode(&bytes).unwrap(), value);
}

#[test]
fn randomized_graphs_round_trip() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let items: Vec<Value> = (0..rng.gen_range(0, 40))
            .map(|_| match rng.gen_range(0, 5) {
                0 => Value::I32(rng.gen()),
                1 => Value::I64(rng.gen()),
                2 => Value::Bool(rng.gen()),
                3 => Value::String(format!("s{}", rng.gen::<u32>() % 8)),
                _ => Value::pair(Value::U8(rng.gen()), Value::Null),
            })
            .collect();
        let value = Value::List(items);
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }
}

#[test]
fn bad_magic_is_rejected() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let mut bytes = codec.encode(&Value::Bool(true)).unwrap();
    bytes[0] ^= 0x40;
    assert!(matches!(
        codec.decode(&bytes),
        Err(CodecError::BadMagic { .. })
    ));
}

#[test]
fn unknown_tags_are_rejected() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let bytes = vec![0xFF, 0x01, 200];
    assert!(matches!(
        codec.decode(&bytes),
        Err(CodecError::UnknownTag { tag: 200 })
    ));
}

#[test]
fn every_strict_prefix_of_a_blob_is_rejected() {
    let registry = FormatterRegistry::standard();
    let codec = ObjectGraphCodec::new(&registry);
    let value = Value::pair(
        Value::String("prefix-check".to_string()),
        Value::List(vec![Value::I32(123456), Value::Null]),
    );
    let bytes = codec.encode(&value).unwrap();
    for cut in 0..bytes.len() {
        assert!(
            codec.decode(&bytes[..cut]).is_err(),
            "prefix of length {} unexpectedly decoded",
            cut
        );
    }
}
