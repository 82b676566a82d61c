use crate::types::Value;

// linearly map a number from one range to another
pub fn remap(s: Value, range_in: [Value; 2], range_out: [Value; 2]) -> Value {
    range_out[0] + (s - range_in[0]) * (range_out[1] - range_out[0]) / (range_in[1] - range_in[0])
}

// Linear interpolation
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

// Position of bin `i` inside `[lo, hi)`, in [0, 1)
pub fn bin_position(i: i64, lo: i64, hi: i64) -> Value {
    remap(i as Value, [lo as Value, hi as Value], [0.0, 1.0])
}
