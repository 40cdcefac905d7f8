/// Position of `cur` within `[x, y]` as a whole percentage.
///
/// The denominator is at least 1, so `x == y` yields 0 at `cur == x` and the
/// counter completes on its first tick. Result is clamped to `[0, 100]`.
pub fn percentage(cur: i64, x: i64, y: i64) -> u8 {
    let denom = (i128::from(y) - i128::from(x)).max(1) as f64;
    let p = ((i128::from(cur) - i128::from(x)) as f64 * 100.0 / denom).round();
    p.clamp(0.0, 100.0) as u8
}
