//! Reduce-on-plateau learning rate schedule driven by validation loss.
//!
//! An epoch "improves" when `loss < best · (1 − threshold)`. After more
//! than `patience` consecutive epochs without improvement the rate is
//! multiplied by `factor` and the counter starts over.

#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr:        f64,
    factor:    f64,
    patience:  usize,
    threshold: f64,
    min_lr:    f64,
    best:      f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(initial_lr: f64, factor: f64, patience: usize) -> Self {
        Self {
            lr:         initial_lr,
            factor,
            patience,
            threshold:  1e-4,
            min_lr:     0.0,
            best:       f64::INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed one epoch's validation loss; returns the rate for the next epoch.
    /// A NaN loss never counts as an improvement.
    pub fn step(&mut self, val_loss: f64) -> f64 {
        if val_loss < self.best * (1.0 - self.threshold) {
            self.best       = val_loss;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs > self.patience {
            let reduced = (self.lr * self.factor).max(self.min_lr);
            if reduced < self.lr {
                tracing::info!("Reducing learning rate {:.3e} → {:.3e}", self.lr, reduced);
                self.lr = reduced;
            }
            self.bad_epochs = 0;
        }

        self.lr
    }
}
