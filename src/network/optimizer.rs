use super::layer::{Dense, Gradients};


// SGD

/// Plain gradient descent: no momentum, no weight decay, no clipping.
#[derive(Clone, Copy, Debug)]
pub struct SGD {
    learning_rate: f32,
}

impl SGD {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Applies one update per layer. All gradients must already be computed.
    pub fn step(&self, layers: &mut [Dense], gradients: &[Gradients]) {
        assert_eq!(layers.len(), gradients.len(), "one gradient per layer");

        for (layer, grads) in layers.iter_mut().zip(gradients) {
            layer.weights = layer.weights.map2(&grads.d_weights, |w, dw| {
                w - self.learning_rate * dw
            });
            layer.biases = layer.biases.map2(&grads.d_biases, |b, db| {
                b - self.learning_rate * db
            });
        }
    }
}
