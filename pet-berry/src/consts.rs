//! 通用常量.

/// `FWHM = FWHM_TO_SIGMA * sigma`, 即 `2 * sqrt(2 * ln 2)`.
pub const FWHM_TO_SIGMA: f64 = 2.354_820_045_030_949_4;

/// Iterative Yang 默认迭代次数.
pub const DEFAULT_ITERATIONS: usize = 10;

/// GTM 允许的最大条件数. 超过该值时认为矩阵病态, 求解失败.
pub const DEFAULT_MAX_CONDITION: f64 = 1e6;

/// 高斯核截断处相对峰值的最大误差.
pub const DEFAULT_KERNEL_MAX_ERROR: f64 = 0.01;

/// 高斯核单轴最大宽度 (抽头个数).
pub const DEFAULT_MAX_KERNEL_WIDTH: usize = 32;

/// mask 体素值允许超出 `[0, 1]` 的浮点容差.
pub const MASK_VALUE_TOLERANCE: f32 = 1e-4;

/// 判断两个体素分辨率 (毫米) 是否一致的容差.
pub const SPACING_TOLERANCE: f64 = 1e-4;

#[cfg(test)]
mod tests {
    use super::FWHM_TO_SIGMA;

    #[test]
    fn test_fwhm_factor() {
        let expected = 2.0 * (2.0 * 2.0_f64.ln()).sqrt();
        assert!((FWHM_TO_SIGMA - expected).abs() < 1e-12);
    }
}
