pub mod tensor;
pub mod layer;
pub mod loss;
pub mod optimizer;
pub mod checkpoint;

use tensor::Tensor;
use layer::{Dense, Gradients, ReLU};
use loss::MeanSquaredError;
use optimizer::SGD;
use checkpoint::Checkpoint;

use crate::error::{ConfigurationError, PersistenceError};
use rand::Rng;
use std::path::Path;

/// Values recorded by the last `forward` call, consumed by the backward pass.
///
/// `activations[0]` is the network input; `activations[i + 1]` and
/// `pre_activations[i]` belong to layer `i`. Overwritten on every forward call.
#[derive(Clone, Debug, Default)]
pub struct ForwardCache {
    pub pre_activations: Vec<Tensor>,
    pub activations: Vec<Tensor>,
}

/// Fully-connected Q-value approximator: relu on every hidden layer, linear output.
///
/// A model instance is not meant to be shared between threads: each forward
/// call rewrites the cache the next backward pass reads.
pub struct NetworkModel {
    layers: Vec<Dense>,
    loss: MeanSquaredError,
    optimizer: SGD,
    cache: ForwardCache,
}

impl NetworkModel {
    pub fn new(input_size: usize, hidden_sizes: &[usize], output_size: usize, learning_rate: f32) -> Result<Self, ConfigurationError> {
        Self::with_rng(input_size, hidden_sizes, output_size, learning_rate, &mut rand::rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self, ConfigurationError> {
        validate_learning_rate(learning_rate)?;

        let mut widths = Vec::with_capacity(hidden_sizes.len() + 2);
        widths.push(input_size);
        widths.extend_from_slice(hidden_sizes);
        widths.push(output_size);

        if let Some(layer) = widths.iter().position(|&w| w == 0) {
            return Err(ConfigurationError::ZeroWidth { layer });
        }

        let layers = widths
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], rng))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_layers(layers, learning_rate)
    }

    /// Builds a model around existing parameters, rejecting inconsistent shapes.
    pub fn from_layers(layers: Vec<Dense>, learning_rate: f32) -> Result<Self, ConfigurationError> {
        validate_learning_rate(learning_rate)?;
        validate_layers(&layers)?;

        Ok(Self {
            layers,
            loss: MeanSquaredError,
            optimizer: SGD::new(learning_rate),
            cache: ForwardCache::default(),
        })
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        self.layers.iter().map(|l| (l.input_size(), l.output_size())).collect()
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    pub fn learning_rate(&self) -> f32 {
        self.optimizer.learning_rate()
    }

    pub fn cache(&self) -> &ForwardCache {
        &self.cache
    }

    /// Runs `input` (shape `rows x input_size`) through every layer and refreshes the cache.
    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let last = self.layers.len() - 1;

        self.cache.pre_activations.clear();
        self.cache.activations.clear();
        self.cache.activations.push(input.clone());

        let mut output = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&output);
            output = if i == last { z.clone() } else { ReLU::forward(&z) };
            self.cache.pre_activations.push(z);
            self.cache.activations.push(output.clone());
        }

        output
    }

    /// Loss and per-layer gradients for one `(input, target)` pair, without applying them.
    pub fn gradients(&mut self, input: &Tensor, target: &Tensor) -> (f32, Vec<Gradients>) {
        let prediction = self.forward(input);
        let loss = self.loss.calculate(&prediction, target);

        let mut delta = self.loss.gradient(&prediction, target);
        let mut gradients = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            gradients.push(layer.gradients(&self.cache.activations[i], &delta));
            if i > 0 {
                delta = ReLU::backward(&self.cache.pre_activations[i - 1], &layer.propagate(&delta));
            }
        }
        gradients.reverse();

        (loss, gradients)
    }

    /// One gradient-descent step toward `target`. Returns the mean squared error before the update.
    pub fn train_step(&mut self, input: &Tensor, target: &Tensor) -> f32 {
        let (loss, gradients) = self.gradients(input, target);
        self.optimizer.step(&mut self.layers, &gradients);
        loss
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        Checkpoint::from_layers(&self.layers).write(path.as_ref())
    }

    /// Replaces every parameter from a checkpoint. On any error the model is left as it was.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let layers = Checkpoint::read(path.as_ref())?.into_layers(&self.layer_shapes())?;
        self.layers = layers;
        self.cache = ForwardCache::default();
        Ok(())
    }
}

fn validate_learning_rate(learning_rate: f32) -> Result<(), ConfigurationError> {
    if learning_rate > 0.0 && learning_rate.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::LearningRate(learning_rate))
    }
}

fn validate_layers(layers: &[Dense]) -> Result<(), ConfigurationError> {
    if layers.is_empty() {
        return Err(ConfigurationError::NoLayers);
    }

    for (i, layer) in layers.iter().enumerate() {
        if layer.weights.shape.len() != 2 {
            return Err(ConfigurationError::WeightRank { layer: i, found: layer.weights.shape.clone() });
        }
        if layer.input_size() == 0 || layer.output_size() == 0 {
            return Err(ConfigurationError::ZeroWidth { layer: i });
        }
        if layer.biases.shape != [1, layer.output_size()] {
            return Err(ConfigurationError::BiasShape {
                layer: i,
                expected: layer.output_size(),
                found: layer.biases.shape.clone(),
            });
        }
        if i > 0 && layers[i - 1].output_size() != layer.input_size() {
            return Err(ConfigurationError::LayerMismatch {
                layer: i,
                expected: layers[i - 1].output_size(),
                found: layer.input_size(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn one_hot_state(index: usize) -> Tensor {
        let mut features = vec![0.0; 11];
        features[index] = 1.0;
        Tensor::row(features)
    }

    // 2 inputs, 2 hidden, 1 output with both hidden units well inside the active region
    fn small_layers() -> Vec<Dense> {
        let mut hidden = Dense::zeros(2, 2);
        hidden.weights = Tensor::from_vec(vec![0.5, -0.3, 0.4, 0.6], vec![2, 2]);
        hidden.biases = Tensor::row(vec![0.1, -0.2]);
        let mut output = Dense::zeros(2, 1);
        output.weights = Tensor::from_vec(vec![0.7, -0.5], vec![2, 1]);
        output.biases = Tensor::row(vec![0.05]);
        vec![hidden, output]
    }

    fn half_squared_error(layers: Vec<Dense>, input: &Tensor, target: f64) -> f64 {
        let mut model = NetworkModel::from_layers(layers, 0.01).unwrap();
        let out = model.forward(input).read()[0] as f64;
        0.5 * (out - target).powi(2)
    }

    #[test]
    fn test_new_shapes() {
        let model = NetworkModel::new(11, &[256], 3, 0.001).unwrap();
        assert_eq!(model.layer_shapes(), vec![(11, 256), (256, 3)]);
        assert_eq!((model.input_size(), model.output_size()), (11, 3));
        assert!(model.layers().iter().all(|l| l.biases.read().iter().all(|&b| b == 0.0)));
    }

    #[test]
    fn test_construction_rejects_bad_dimensions() {
        assert!(matches!(NetworkModel::new(11, &[0], 3, 0.001), Err(ConfigurationError::ZeroWidth { layer: 1 })));
        assert!(matches!(NetworkModel::new(0, &[4], 3, 0.001), Err(ConfigurationError::ZeroWidth { layer: 0 })));
        assert!(matches!(NetworkModel::new(11, &[4], 3, 0.0), Err(ConfigurationError::LearningRate(_))));
        assert!(matches!(NetworkModel::from_layers(vec![], 0.1), Err(ConfigurationError::NoLayers)));

        let mismatched = vec![Dense::zeros(11, 4), Dense::zeros(5, 3)];
        assert!(matches!(
            NetworkModel::from_layers(mismatched, 0.1),
            Err(ConfigurationError::LayerMismatch { layer: 1, expected: 4, found: 5 })
        ));

        let mut bad_bias = Dense::zeros(2, 2);
        bad_bias.biases = Tensor::row(vec![0.0; 3]);
        assert!(matches!(NetworkModel::from_layers(vec![bad_bias], 0.1), Err(ConfigurationError::BiasShape { .. })));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let mut model = NetworkModel::with_rng(11, &[32, 16], 3, 0.001, &mut StdRng::seed_from_u64(11)).unwrap();
        let state = one_hot_state(4);

        let first = model.forward(&state);
        let second = model.forward(&state);

        assert_eq!(first, second);
        assert_eq!(first.shape, vec![1, 3]);
    }

    #[test]
    fn test_forward_fills_cache() {
        let mut model = NetworkModel::from_layers(small_layers(), 0.01).unwrap();
        let input = Tensor::row(vec![1.0, 2.0]);
        model.forward(&input);

        let cache = model.cache();
        assert_eq!(cache.activations.len(), 3);
        assert_eq!(cache.pre_activations.len(), 2);
        assert_eq!(cache.activations[0], input);
        // z1 = [1.4, 0.7], both positive so relu passes them through
        assert_eq!(cache.activations[1], ReLU::forward(&cache.pre_activations[0]));
        // output layer is linear
        assert_eq!(cache.activations[2], cache.pre_activations[1]);
    }

    #[test]
    fn test_hidden_relu_clamps_negative() {
        let mut hidden = Dense::zeros(1, 2);
        hidden.weights = Tensor::row(vec![1.0, -1.0]);
        let mut output = Dense::zeros(2, 1);
        output.weights = Tensor::from_vec(vec![1.0, 1.0], vec![2, 1]);
        output.biases = Tensor::row(vec![-5.0]);
        let mut model = NetworkModel::from_layers(vec![hidden, output], 0.01).unwrap();

        // hidden = relu([3, -3]) = [3, 0]; output = 3 - 5 stays negative
        let out = model.forward(&Tensor::row(vec![3.0]));
        assert_eq!(out.read(), &[-2.0]);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let input = Tensor::row(vec![1.0, 2.0]);
        let target = 2.0;
        let mut model = NetworkModel::from_layers(small_layers(), 0.01).unwrap();
        let (_, analytic) = model.gradients(&input, &Tensor::row(vec![target]));

        let h = 0.05;
        for layer in 0..2 {
            for bias in [false, true] {
                let grads = if bias { &analytic[layer].d_biases } else { &analytic[layer].d_weights };
                for k in 0..grads.len() {
                    let perturbed = |delta: f32| {
                        let mut layers = small_layers();
                        let param = if bias { &mut layers[layer].biases } else { &mut layers[layer].weights };
                        param.write()[k] += delta;
                        layers
                    };
                    let numeric = (half_squared_error(perturbed(h), &input, target as f64)
                        - half_squared_error(perturbed(-h), &input, target as f64))
                        / (2.0 * h as f64);
                    let exact = grads.read()[k] as f64;

                    let tolerance = 1e-4 * exact.abs().max(numeric.abs());
                    assert!(
                        (exact - numeric).abs() <= tolerance,
                        "layer {} {} [{}]: analytic {} vs numeric {}",
                        layer, if bias { "bias" } else { "weight" }, k, exact, numeric
                    );
                }
            }
        }
    }

    #[test]
    fn test_zero_network_learns_first_output() {
        let layers = vec![Dense::zeros(11, 4), Dense::zeros(4, 3)];
        let mut model = NetworkModel::from_layers(layers, 0.001).unwrap();
        let state = one_hot_state(0);

        let before = model.forward(&state);
        assert_eq!(before.read(), &[0.0, 0.0, 0.0]);

        model.train_step(&state, &Tensor::row(vec![1.0, 0.0, 0.0]));

        let after = model.forward(&state);
        assert!(after.read()[0] > 0.0, "first output did not increase: {:?}", after);
        assert_eq!(&after.read()[1..], &[0.0, 0.0]);
    }

    #[test]
    fn test_train_step_reduces_loss() {
        let mut model = NetworkModel::with_rng(11, &[16], 3, 0.01, &mut StdRng::seed_from_u64(5)).unwrap();
        let state = one_hot_state(2);
        let mut target = model.forward(&state);
        target.write()[1] = 5.0;

        let first = model.train_step(&state, &target);
        let mut last = first;
        for _ in 0..50 {
            last = model.train_step(&state, &target);
        }
        assert!(last < first, "loss went from {} to {}", first, last);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model").join("model.bin");

        let original = NetworkModel::with_rng(11, &[8, 4], 3, 0.001, &mut StdRng::seed_from_u64(1)).unwrap();
        original.save(&path).unwrap();

        let mut restored = NetworkModel::with_rng(11, &[8, 4], 3, 0.001, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_ne!(restored.layers(), original.layers());
        restored.load(&path).unwrap();

        assert_eq!(restored.layers(), original.layers());
    }

    #[test]
    fn test_failed_load_leaves_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let mut model = NetworkModel::with_rng(11, &[8], 3, 0.001, &mut StdRng::seed_from_u64(3)).unwrap();
        let before = model.layers().to_vec();

        assert!(matches!(model.load(&path), Err(PersistenceError::NotFound(_))));
        assert_eq!(model.layers(), before.as_slice());

        let other_shape = NetworkModel::new(11, &[16], 3, 0.001).unwrap();
        other_shape.save(&path).unwrap();
        assert!(matches!(model.load(&path), Err(PersistenceError::ShapeMismatch { .. })));
        assert_eq!(model.layers(), before.as_slice());

        let deeper = NetworkModel::new(11, &[8, 8], 3, 0.001).unwrap();
        deeper.save(&path).unwrap();
        assert!(matches!(model.load(&path), Err(PersistenceError::LayerCountMismatch { expected: 2, found: 3 })));
        assert_eq!(model.layers(), before.as_slice());

        std::fs::write(&path, [0xff; 7]).unwrap();
        assert!(matches!(model.load(&path), Err(PersistenceError::Corrupt { .. })));
        assert_eq!(model.layers(), before.as_slice());
    }
}
