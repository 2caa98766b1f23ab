//! 可分离离散高斯模糊.

use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis, Zip};

use crate::config::PvcConfig;
use crate::{Axes3, Grid, Psf, PvcError, PvcResult, Volume};

/// 生成归一化的一维采样高斯核. `variance` 以体素为单位.
///
/// 核半径取高斯值降到峰值 `max_error` 倍处, 且总宽度不超过 `max_width`.
/// `variance <= 0` 时返回单位核 `[1.0]`.
pub fn gaussian_kernel(variance: f64, max_error: f64, max_width: usize) -> Vec<f64> {
    if !(variance > 0.0) {
        return vec![1.0];
    }
    let sigma = variance.sqrt();
    let radius = (sigma * (-2.0 * max_error.ln()).sqrt()).ceil() as usize;
    let radius = radius.min(max_width.saturating_sub(1) / 2);

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-d * d / (2.0 * variance)).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);
    kernel
}

/// 给定网格上的高斯模糊算子. 三个轴的卷积核在构建时计算一次, 之后可重复使用.
///
/// 边界按零通量 (复制边缘体素) 处理.
#[derive(Debug, Clone)]
pub struct GaussianBlur {
    grid: Grid,
    kernels: [Vec<f64>; 3],
}

impl GaussianBlur {
    /// 由 PSF 和网格构建. PSF 方差按网格体素分辨率换算为体素单位.
    pub fn new(psf: &Psf, grid: &Grid, config: &PvcConfig) -> Self {
        Self::from_variance(psf.variance_voxels(&grid.spacing()), grid, config)
    }

    /// 由体素单位的方差 (z, y, x) 直接构建.
    pub fn from_variance(variance: Axes3, grid: &Grid, config: &PvcConfig) -> Self {
        let kernels = variance
            .map(|v| gaussian_kernel(v, config.kernel_max_error, config.max_kernel_width));
        Self {
            grid: *grid,
            kernels,
        }
    }

    /// 是否为恒等变换.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.kernels.iter().all(|k| k.len() == 1)
    }

    /// 模糊 `data`. 调用者保证 `data` 位于构建时的网格上, 否则 panic.
    pub fn apply(&self, data: ArrayView3<f32>) -> Array3<f32> {
        assert_eq!(data.dim(), self.grid.shape(), "数据与模糊算子的网格不一致");
        let mut out = data.to_owned();
        for (axis, kernel) in self.kernels.iter().enumerate() {
            convolve_axis(&mut out, Axis(axis), kernel);
        }
        out
    }

    /// 模糊图像. 图像不在构建时的网格上时返回 `Err(PvcError::GridMismatch)`.
    pub fn apply_volume(&self, volume: &Volume) -> PvcResult<Volume> {
        if !volume.grid().same_as(&self.grid) {
            return Err(PvcError::GridMismatch);
        }
        volume.with_data(self.apply(volume.data()))
    }
}

/// 对一条一维数据做卷积, 越界位置取最近的边缘值.
fn convolve_lane(mut lane: ArrayViewMut1<f32>, kernel: &[f64]) {
    let src = lane.to_vec();
    let last = src.len() as isize - 1;
    let radius = (kernel.len() / 2) as isize;
    for (i, out) in lane.iter_mut().enumerate() {
        let acc: f64 = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let j = (i as isize + k as isize - radius).clamp(0, last) as usize;
                w * src[j] as f64
            })
            .sum();
        *out = acc as f32;
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon`, 并行地沿 `axis` 对每条数据做卷积.
        fn convolve_axis(data: &mut Array3<f32>, axis: Axis, kernel: &[f64]) {
            if kernel.len() == 1 {
                return;
            }
            Zip::from(data.lanes_mut(axis)).par_for_each(|lane| convolve_lane(lane, kernel));
        }
    } else {
        /// 沿 `axis` 对每条数据做卷积.
        fn convolve_axis(data: &mut Array3<f32>, axis: Axis, kernel: &[f64]) {
            if kernel.len() == 1 {
                return;
            }
            Zip::from(data.lanes_mut(axis)).for_each(|lane| convolve_lane(lane, kernel));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{gaussian_kernel, GaussianBlur};
    use crate::config::PvcConfig;
    use crate::{Grid, Psf, Volume};
    use ndarray::Array3;

    #[test]
    fn test_kernel_shape() {
        assert_eq!(gaussian_kernel(0.0, 0.01, 32), vec![1.0]);
        assert_eq!(gaussian_kernel(-1.0, 0.01, 32), vec![1.0]);

        let k = gaussian_kernel(1.0, 0.01, 32);
        // sigma = 1 -> radius = ceil(3.03) = 4
        assert_eq!(k.len(), 9);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(k.windows(2).take(4).all(|w| w[0] < w[1]));
        for i in 0..4 {
            assert!((k[i] - k[8 - i]).abs() < 1e-15);
        }

        // 被最大宽度截断.
        assert_eq!(gaussian_kernel(100.0, 0.01, 9).len(), 9);
        assert_eq!(gaussian_kernel(100.0, 0.01, 1).len(), 1);
    }

    #[test]
    fn test_identity_blur() {
        let grid = Grid::new((3, 4, 5), [1.0; 3]);
        let blur = GaussianBlur::new(&Psf::identity(), &grid, &PvcConfig::default());
        assert!(blur.is_identity());

        let data = Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z + 2 * y + 3 * x) as f32);
        assert_eq!(blur.apply(data.view()), data);
    }

    #[test]
    fn test_blur_preserves_constant_and_mass() {
        let grid = Grid::new((9, 9, 9), [2.0; 3]);
        let psf = Psf::from_fwhm_xyz(4.0, 4.0, 4.0).unwrap();
        let blur = GaussianBlur::new(&psf, &grid, &PvcConfig::default());
        assert!(!blur.is_identity());

        let flat = Volume::from_array(Array3::from_elem((9, 9, 9), 5.0), [2.0; 3]);
        let out = blur.apply_volume(&flat).unwrap();
        assert!(out.data().iter().all(|v| (v - 5.0).abs() < 1e-4));

        // 中心点源远离边界时质量守恒, 且峰值下降.
        let mut point = Array3::zeros((9, 9, 9));
        point[(4, 4, 4)] = 1.0;
        let out = blur.apply(point.view());
        assert!((out.iter().map(|&v| v as f64).sum::<f64>() - 1.0).abs() < 1e-5);
        assert!(out[(4, 4, 4)] < 1.0);
        assert!(out[(4, 4, 3)] > 0.0);
        assert!((out[(4, 4, 3)] - out[(4, 4, 5)]).abs() < 1e-7);
    }

    #[test]
    fn test_anisotropic_blur() {
        let grid = Grid::new((7, 7, 7), [1.0; 3]);
        // 只在 x 方向模糊.
        let psf = Psf::from_fwhm_xyz(3.0, 0.0, 0.0).unwrap();
        let blur = GaussianBlur::new(&psf, &grid, &PvcConfig::default());
        let mut point = Array3::zeros((7, 7, 7));
        point[(3, 3, 3)] = 1.0;
        let out = blur.apply(point.view());
        assert!(out[(3, 3, 4)] > 0.0);
        assert_eq!(out[(3, 4, 3)], 0.0);
        assert_eq!(out[(4, 3, 3)], 0.0);
    }

    #[test]
    fn test_blur_grid_mismatch() {
        let grid = Grid::new((3, 3, 3), [1.0; 3]);
        let blur = GaussianBlur::new(&Psf::identity(), &grid, &PvcConfig::default());
        let v = Volume::from_array(Array3::zeros((3, 3, 4)), [1.0; 3]);
        assert!(blur.apply_volume(&v).is_err());
    }
}
