use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use rayon::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

// storage is shared between clones and transposed views; writes copy on demand
pub struct Tensor {
    data: Arc<Vec<f32>>,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

impl Tensor {
    pub fn zeros(shape: Vec<usize>) -> Self {
        let data: Vec<f32> = vec![0.0; shape.iter().product()];
        Self::from_vec(data, shape)
    }

    /// Samples every element from `N(0, std)`.
    pub fn random_normal<R: Rng + ?Sized>(shape: Vec<usize>, std: f32, rng: &mut R) -> Result<Self, NormalError> {
        let normal = Normal::new(0.0, std)?;
        let data: Vec<f32> = (0..shape.iter().product()).map(|_| normal.sample(rng)).collect();
        Ok(Self::from_vec(data, shape))
    }

    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>(), "data length must match shape");
        Self {
            data: Arc::new(data),
            strides: Tensor::calc_strides(&shape),
            shape,
        }
    }

    // 1 x n
    pub fn row(data: Vec<f32>) -> Self {
        let n = data.len();
        Self::from_vec(data, vec![1, n])
    }

    /// Elements of a contiguous tensor. Outside the crate, use `row_major()`,
    /// which also handles transposed views.
    pub(crate) fn read(&self) -> &[f32] {
        debug_assert!(self.is_contiguous(), "read through a transposed view");
        self.data.as_slice()
    }

    pub fn write(&mut self) -> &mut [f32] {
        debug_assert!(self.is_contiguous(), "write through a transposed view");
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    // allocation order, indexed through `strides`
    fn storage(&self) -> &[f32] {
        self.data.as_slice()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides == Tensor::calc_strides(&self.shape)
    }

    /// Elements in logical row-major order.
    pub fn row_major(&self) -> Cow<'_, [f32]> {
        if self.is_contiguous() {
            return Cow::Borrowed(self.data.as_slice());
        }
        assert_eq!(self.shape.len(), 2, "only 2D views can be non-contiguous");

        let (m, n) = (self.shape[0], self.shape[1]);
        let mut out = Vec::with_capacity(m * n);
        for i in 0..m {
            for j in 0..n {
                out.push(self.data[i * self.strides[0] + j * self.strides[1]]);
            }
        }
        Cow::Owned(out)
    }

    pub fn into_vec(self) -> Vec<f32> {
        if self.is_contiguous() {
            Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
        } else {
            self.row_major().into_owned()
        }
    }

    pub fn transpose(&self) -> Self {
        let mut new_shape = self.shape.clone();
        new_shape.reverse();
        let mut new_strides = self.strides.clone();
        new_strides.reverse();

        Self {
            data: Arc::clone(&self.data),
            shape: new_shape,
            strides: new_strides,
        }
    }

    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape.len(), 2, "self must be a 2D tensor.");
        assert_eq!(other.shape.len(), 2, "other must be a 2D tensor.");
        assert_eq!(self.shape[1], other.shape[0], "self columns must equal other rows");

        let m = self.shape[0];
        let k = self.shape[1];
        let n = other.shape[1];

        let mut c = Tensor::zeros(vec![m, n]);
        if n == 0 {
            return c;
        }

        let a_data = self.storage();
        let b_data = other.storage();
        let (a_strides, b_strides) = (&self.strides, &other.strides);

        // rows are independent, each row accumulates in a fixed order
        c.write().par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
            for k_idx in 0..k {
                let a_val = a_data[m_idx * a_strides[0] + k_idx * a_strides[1]];
                for n_idx in 0..n {
                    let b_val = b_data[k_idx * b_strides[0] + n_idx * b_strides[1]];
                    c_row[n_idx] += a_val * b_val;
                }
            }
        });

        c
    }

    pub fn sum(&self, axis: usize) -> Tensor {
        assert_eq!(self.shape.len(), 2, "sum only works for 2D tensors");
        assert!(axis < 2, "axis must be 0 or 1");

        let data = self.row_major();
        let m = self.shape[0];
        let n = self.shape[1];

        if axis == 0 {
            let mut column_sums = vec![0.0; n];
            for row in data.chunks(n.max(1)) {
                for (acc, value) in column_sums.iter_mut().zip(row) {
                    *acc += value;
                }
            }
            Tensor::from_vec(column_sums, vec![1, n])
        } else {
            let row_sums = if n == 0 {
                vec![0.0; m]
            } else {
                data.par_chunks(n).map(|row| row.iter().sum()).collect()
            };
            Tensor::from_vec(row_sums, vec![m, 1])
        }
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where F: Fn(f32) -> f32 + Sync + Send {
        let input_data = self.row_major();
        let new_data: Vec<f32> = input_data.par_iter().map(|&x| f(x)).collect();
        Tensor::from_vec(new_data, self.shape.clone())
    }

    // map through self allowing access to second tensor
    pub fn map2<F>(&self, other: &Tensor, f: F) -> Tensor
    where F: Fn(f32, f32) -> f32 + Sync + Send {
        assert_eq!(self.shape, other.shape, "tensors must have the same shape");

        let data1 = self.row_major();
        let data2 = other.row_major();
        let new_data: Vec<f32> = data1.par_iter().zip(data2.par_iter()).map(|(&x1, &x2)| f(x1, x2)).collect();
        Tensor::from_vec(new_data, self.shape.clone())
    }

    /// Index of the largest element; ties resolve to the lowest index.
    pub fn argmax(&self) -> usize {
        let data = self.row_major();
        let mut best = 0;
        for (i, &value) in data.iter().enumerate().skip(1) {
            if value > data[best] {
                best = i;
            }
        }
        best
    }

    pub fn max(&self) -> f32 {
        self.row_major().iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b))
    }

    fn calc_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides: Vec<usize> = vec![1; shape.len()];
        for i in (0..strides.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.row_major() == other.row_major()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
         .field("shape", &self.shape)
         .field("data", &self.row_major())
         .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SerializableTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        let s_tensor = SerializableTensor {
            shape: self.shape.clone(),
            data: self.row_major().into_owned(),
        };
        s_tensor.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        let s_tensor = SerializableTensor::deserialize(deserializer)?;
        let expected = s_tensor
            .shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| D::Error::custom("tensor shape overflows"))?;
        if expected != s_tensor.data.len() {
            return Err(D::Error::custom(format!(
                "tensor shape {:?} needs {} values, found {}",
                s_tensor.shape,
                expected,
                s_tensor.data.len()
            )));
        }
        Ok(Tensor::from_vec(s_tensor.data, s_tensor.shape))
    }
}
