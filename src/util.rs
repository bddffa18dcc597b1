use rand::Rng;

/// Pick one of `options` using integer selection weights.
pub(crate) fn weighted_choice<'a, T>(rng: &mut impl Rng, options: &'a [T], weights: &[u32]) -> &'a T {
    assert_eq!(options.len(), weights.len());

    let total: u32 = weights.iter().sum();
    let mut rnd = rng.gen_range(0..total);

    for (option, &weight) in options.iter().zip(weights) {
        if rnd < weight {
            return option;
        }
        rnd -= weight;
    }

    // Fallback
    &options[0]
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
