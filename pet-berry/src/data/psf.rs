//! 扫描仪点扩散函数 (PSF), 以可分离高斯模型表示.

use crate::consts::FWHM_TO_SIGMA;
use crate::Axes3;

/// 各向异性高斯 PSF, 由每个轴上的半高全宽 (FWHM, 毫米) 描述.
/// 内部按 (z, y, x) 组织.
///
/// 该结构是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Psf {
    fwhm: Axes3,
}

impl Psf {
    /// 由 x, y, z 三个方向的 FWHM (毫米) 构建 PSF. 注意参数顺序与内部存储相反.
    ///
    /// 任一 FWHM 为负数或非有限值时返回 `None`. FWHM 为 0 表示该方向不模糊.
    pub fn from_fwhm_xyz(x: f64, y: f64, z: f64) -> Option<Self> {
        let fwhm = [z, y, x];
        fwhm.iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            .then_some(Self { fwhm })
    }

    /// 不做任何模糊的 PSF.
    #[inline]
    pub const fn identity() -> Self {
        Self { fwhm: [0.0; 3] }
    }

    /// 半高全宽, 以毫米为单位, 按 (z, y, x) 组织.
    #[inline]
    pub fn fwhm_mm(&self) -> Axes3 {
        self.fwhm
    }

    /// 高斯标准差, 以毫米为单位.
    #[inline]
    pub fn sigma_mm(&self) -> Axes3 {
        self.fwhm.map(|f| f / FWHM_TO_SIGMA)
    }

    /// 高斯方差, 以平方毫米为单位.
    #[inline]
    pub fn variance_mm2(&self) -> Axes3 {
        self.sigma_mm().map(|s| s * s)
    }

    /// 体素网格上的高斯方差, 以体素为单位:
    /// `(FWHM / (2 * sqrt(2 * ln 2)) / spacing)^2`.
    pub fn variance_voxels(&self, spacing: &Axes3) -> Axes3 {
        let sigma = self.sigma_mm();
        [
            (sigma[0] / spacing[0]).powi(2),
            (sigma[1] / spacing[1]).powi(2),
            (sigma[2] / spacing[2]).powi(2),
        ]
    }

    /// 是否在所有方向上都不模糊.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.fwhm.iter().all(|&f| f == 0.0)
    }
}
