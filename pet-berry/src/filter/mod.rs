//! 图像滤波.

mod gaussian;

pub use gaussian::{gaussian_kernel, GaussianBlur};
