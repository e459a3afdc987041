mod property_fan_out;
mod property_pushback;

/// Number of quickcheck cases, raised on CI.
fn quickcheck_tests() -> u64 {
    if cfg!(miri) {
        10
    } else if is_ci::cached() {
        10_000
    } else {
        1_000
    }
}
