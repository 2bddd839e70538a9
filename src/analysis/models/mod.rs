//! Bundled scoring models.
//!
//! `DenseModel` loads a small persisted network; `ChromaModel` scores pitch
//! lanes from harmonic templates and needs no trained weights.

mod chroma;
mod dense;

pub use chroma::ChromaModel;
pub use dense::{Activation, DenseLayer, DenseModel};
