// ============================================================
// Layer 4 - Per-Identity Train/Validation Split
// ============================================================
// Shuffles one identity's images and cuts the list in two:
//   - train/  pairs drawn from here update the weights
//   - val/    pairs drawn from here calibrate the threshold
//
// Applied per identity, so every person lands on both sides
// when they have enough images and the validation sampler can
// still build positive pairs.
//
// The training share is floored: 3 images at 0.8 → 2 / 1, and
// a lone image goes to val/ unless the fraction is 1.0.
//
// Reference: rand crate documentation (SliceRandom::shuffle)

use rand::{seq::SliceRandom, Rng};

/// `floor(len × train_fraction)`, never more than `len`.
pub fn train_count(len: usize, train_fraction: f64) -> usize {
    ((len as f64 * train_fraction).floor() as usize).min(len)
}

/// Shuffle with the thread RNG and split into (train, validation).
pub fn split_train_val<T>(samples: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    split_train_val_with(samples, train_fraction, &mut rand::thread_rng())
}

pub fn split_train_val_with<T, R: Rng>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);
    let val = samples.split_off(train_count(samples.len(), train_fraction));
    tracing::debug!("{} train / {} validation", samples.len(), val.len());
    (samples, val)
}
