use proptest::prelude::*;

/// Number of distinct callbacks a registration plan can refer to
pub const CALLBACK_POOL_SIZE: usize = 8;

/// Sequence of callback indices to register, repeats included
pub fn registration_plan_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..CALLBACK_POOL_SIZE, 0..32)
}

/// Indices into the callback pool to unregister afterwards
pub fn removal_set_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), CALLBACK_POOL_SIZE)
}

/// Order ids in send order
pub fn message_ids_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(any::<u64>(), 0..64)
}
