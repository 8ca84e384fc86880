//! Core value model: dense `f64` tensors.
//!
//! Tensors are deliberately small: a shape and a flat, row-major data buffer.
//! A scalar has shape `[]` and exactly one element. Binary element-wise ops
//! accept equal shapes or a scalar on either side.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Dense, row-major tensor of `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Number of elements a tensor of `shape` holds.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Tensor {
    pub fn scalar(value: f64) -> Self {
        Self { shape: Vec::new(), data: vec![value] }
    }

    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, GraphError> {
        let expected = element_count(&shape);
        if expected != data.len() {
            return Err(GraphError::DataLength { expected, found: data.len() });
        }
        Ok(Self { shape, data })
    }

    pub fn filled(shape: &[usize], value: f64) -> Self {
        Self { shape: shape.to_vec(), data: vec![value; element_count(shape)] }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Tensor with no elements; the value of grouping ops.
    pub fn empty() -> Self {
        Self { shape: vec![0], data: Vec::new() }
    }

    /// Sample every element independently from `[low, high)`.
    pub fn uniform<R: Rng + ?Sized>(shape: &[usize], low: f64, high: f64, rng: &mut R) -> Self {
        let data = (0..element_count(shape))
            .map(|_| if high > low { rng.gen_range(low..high) } else { low })
            .collect();
        Self { shape: shape.to_vec(), data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// The single value of a scalar (or one-element) tensor.
    pub fn as_scalar(&self) -> Option<f64> {
        match self.data.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// True when every element is non-zero (vacuously true when empty).
    pub fn all(&self) -> bool {
        self.data.iter().all(|v| *v != 0.0)
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor, GraphError> {
        self.zip_with("add", other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor, GraphError> {
        self.zip_with("sub", other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor, GraphError> {
        self.zip_with("mul", other, |a, b| a * b)
    }

    /// Element-wise equality, encoded as `1.0` / `0.0`.
    pub fn equal(&self, other: &Tensor) -> Result<Tensor, GraphError> {
        self.zip_with("equal", other, |a, b| if a == b { 1.0 } else { 0.0 })
    }

    fn zip_with(
        &self,
        op: &'static str,
        other: &Tensor,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Tensor, GraphError> {
        if self.shape == other.shape {
            let data = self.data.iter().zip(&other.data).map(|(a, b)| f(*a, *b)).collect();
            return Ok(Tensor { shape: self.shape.clone(), data });
        }
        if let Some(b) = other.as_scalar().filter(|_| other.is_scalar()) {
            let data = self.data.iter().map(|a| f(*a, b)).collect();
            return Ok(Tensor { shape: self.shape.clone(), data });
        }
        if let Some(a) = self.as_scalar().filter(|_| self.is_scalar()) {
            let data = other.data.iter().map(|b| f(a, *b)).collect();
            return Ok(Tensor { shape: other.shape.clone(), data });
        }
        Err(GraphError::ShapeMismatch {
            op,
            left: self.shape.clone(),
            right: other.shape.clone(),
        })
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(data: Vec<f64>) -> Self {
        Tensor { shape: vec![data.len()], data }
    }
}
