use super::tensor::Tensor;
use rand::Rng;
use rand_distr::NormalError;

// initial weights are drawn from N(0, INIT_STD) so the untrained outputs sit near zero
pub const INIT_STD: f32 = 0.1;


// dense layer

/// Affine layer `z = a·W + b`, with `W` shaped `in x out` and `b` shaped `1 x out`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
}

/// Gradients of one dense layer for a single training call.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub d_weights: Tensor,
    pub d_biases: Tensor,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Result<Self, NormalError> {
        let weights = Tensor::random_normal(vec![input_size, output_size], INIT_STD, rng)?;
        let biases = Tensor::zeros(vec![1, output_size]);
        Ok(Self { weights, biases })
    }

    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        Self {
            weights: Tensor::zeros(vec![input_size, output_size]),
            biases: Tensor::zeros(vec![1, output_size]),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape[1]
    }

    pub fn forward(&self, input: &Tensor) -> Tensor {
        let mut output = input.matmul(&self.weights);

        let output_size = output.shape[1];
        let biases = self.biases.read();
        if output_size > 0 {
            for row in output.write().chunks_mut(output_size) {
                for (value, bias) in row.iter_mut().zip(biases) {
                    *value += bias;
                }
            }
        }

        output
    }

    /// dL/dW = input.T @ delta, dL/db = delta.sum(axis=0)
    pub fn gradients(&self, input: &Tensor, delta: &Tensor) -> Gradients {
        Gradients {
            d_weights: input.transpose().matmul(delta),
            d_biases: delta.sum(0),
        }
    }

    /// dL/dX = delta @ weights.T
    pub fn propagate(&self, delta: &Tensor) -> Tensor {
        delta.matmul(&self.weights.transpose())
    }
}


// relu activation

pub struct ReLU;

impl ReLU {
    pub fn forward(z: &Tensor) -> Tensor {
        z.map(|x| x.max(0.0))
    }

    /// Gates `upstream` by the derivative of relu at `z` (1 where z > 0, else 0).
    pub fn backward(z: &Tensor, upstream: &Tensor) -> Tensor {
        z.map2(upstream, |z_val, grad| if z_val > 0.0 { grad } else { 0.0 })
    }
}
