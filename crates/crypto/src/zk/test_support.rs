//! Shared fixtures for the zk unit tests. Setup is slow, so it runs once.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::OnceLock;

use super::encoding::FieldBytes;
use super::keys::CircuitKeys;

pub(crate) fn shared_keys() -> &'static CircuitKeys {
    static KEYS: OnceLock<CircuitKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x6564_6765);
        CircuitKeys::setup(&mut rng).expect("circuit setup")
    })
}

pub(crate) fn test_secret() -> FieldBytes {
    FieldBytes::from_field(&ark_bn254::Fr::from(123_456_789u64))
}
