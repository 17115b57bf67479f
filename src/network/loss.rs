use super::tensor::Tensor;


// mean squared error

/// Squared-error loss for Q-value regression.
///
/// `gradient` returns the raw error `prediction - target` rather than the
/// `2/n`-scaled derivative of the mean, i.e. the derivative of
/// `0.5 * sum((prediction - target)^2)`. The learning rate absorbs the scale.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquaredError;

impl MeanSquaredError {
    pub fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let diff = self.gradient(y_pred, y_true);
        if diff.is_empty() {
            return 0.0;
        }
        diff.read().iter().map(|x| x * x).sum::<f32>() / diff.len() as f32
    }

    pub fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        y_pred.map2(y_true, |pred_x, true_x| pred_x - true_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_only_counts_corrected_slot() {
        let loss_fn = MeanSquaredError;
        let y_pred = Tensor::row(vec![0.5, -1.0, 2.0]);
        let y_true = Tensor::row(vec![0.5, 3.0, 2.0]);

        let gradient = loss_fn.gradient(&y_pred, &y_true);
        assert_eq!(gradient.read(), &[0.0, -4.0, 0.0]);

        // 16 / 3
        let loss = loss_fn.calculate(&y_pred, &y_true);
        assert!((loss - 16.0 / 3.0).abs() < 1e-6, "unexpected loss {}", loss);
    }

    #[test]
    fn test_mse_zero_when_equal() {
        let t = Tensor::row(vec![1.0, 2.0, 3.0]);
        assert_eq!(MeanSquaredError.calculate(&t, &t), 0.0);
    }
}
