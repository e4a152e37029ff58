//! Property tests for the hashing functions underlying `MapObj` (spec
//! §3, §4.3): equal inputs must hash equal, regardless of how they're
//! constructed.

use proptest::prelude::*;

use orbit::value::{fnv1a_hash, hash_double};

proptest! {
    #[test]
    fn equal_byte_strings_hash_equal(s in ".{0,64}") {
        let a = fnv1a_hash(s.as_bytes());
        let b = fnv1a_hash(s.to_string().as_bytes());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn fnv1a_hash_is_deterministic_across_calls(s in ".{0,64}") {
        let h1 = fnv1a_hash(s.as_bytes());
        let h2 = fnv1a_hash(s.as_bytes());
        prop_assert_eq!(h1, h2);
    }

    #[test]
    fn bit_equal_doubles_hash_equal(bits: u64) {
        let n = f64::from_bits(bits);
        prop_assert_eq!(hash_double(n), hash_double(f64::from_bits(n.to_bits())));
    }

    #[test]
    fn hash_double_is_deterministic_across_calls(bits: u64) {
        let n = f64::from_bits(bits);
        let h1 = hash_double(n);
        let h2 = hash_double(n);
        prop_assert_eq!(h1, h2);
    }
}
