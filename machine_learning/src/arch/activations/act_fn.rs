use super::{Relu, Sigmoid};

/// An elementwise activation function applied after a layer's affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFn {
    Relu(Relu),
    Sigmoid(Sigmoid),
}

impl ActFn {
    pub fn relu() -> Self {
        ActFn::Relu(Relu)
    }

    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    /// Evaluates the function at `z`.
    #[inline]
    pub fn f(&self, z: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.f(z),
            ActFn::Sigmoid(a) => a.f(z),
        }
    }

    /// Evaluates the derivative at the pre-activation `z`.
    #[inline]
    pub fn df(&self, z: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.df(z),
            ActFn::Sigmoid(a) => a.df(z),
        }
    }
}
