//! Numerical utilities: linear solves, root finding and nonlinear least squares.

pub mod lm;
pub mod ols;
pub mod roots;

pub use lm::*;
pub use ols::*;
pub use roots::*;
