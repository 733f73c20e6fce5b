//! Exact allocation of a whole number of minor units.
//!
//! Both rules hand out every unit: the returned parts always sum to `total`.

use bigdecimal::{BigDecimal, ToPrimitive, Zero};

/// Splits `total` into `count` parts that differ by at most one unit.
///
/// Every part gets `total / count`; the first `total % count` parts get one
/// extra unit. Callers pass parts in group order, so the remainder lands on
/// the earliest members.
pub fn split_evenly(total: i64, count: usize) -> Vec<i64> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as i64;
    let base = total / n;
    let remainder = (total % n) as usize;
    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Splits `total` proportionally to `weights` using the largest-remainder rule.
///
/// Each part is first floored to `total * w / Σw`. The units left over go
/// one by one to the parts with the largest fractional remainder; ties go to
/// the earlier index. Weights must be non-negative with a positive sum.
pub fn largest_remainder(total: i64, weights: &[BigDecimal]) -> Vec<i64> {
    let weight_total: BigDecimal = weights.iter().sum();
    if weights.is_empty() || weight_total <= BigDecimal::zero() {
        return vec![0; weights.len()];
    }

    let total_dec = BigDecimal::from(total);
    let mut parts = Vec::with_capacity(weights.len());
    let mut fractions = Vec::with_capacity(weights.len());

    for weight in weights {
        let exact = (&total_dec * weight) / &weight_total;
        let floor = exact.with_scale(0);
        fractions.push(&exact - &floor);
        parts.push(floor.to_i64().unwrap_or(0));
    }

    let leftover = total - parts.iter().sum::<i64>();
    if leftover > 0 {
        let mut order: Vec<usize> = (0..weights.len()).collect();
        order.sort_by(|&a, &b| fractions[b].cmp(&fractions[a]).then(a.cmp(&b)));
        for &idx in order.iter().cycle().take(leftover as usize) {
            parts[idx] += 1;
        }
    }

    parts
}
