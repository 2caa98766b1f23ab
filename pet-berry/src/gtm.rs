//! 几何传递矩阵 (Geometric Transfer Matrix, GTM).
//!
//! `M[i][j]` 是区域 `j` 的指示函数经 PSF 模糊后, 在区域 `i` 内的平均值,
//! 即区域 `j` 的信号 "溢出" 到区域 `i` 的比例. 对角线代表自身保留,
//! 非对角线代表相互污染. 于是对真实区域均值 `t` 有 `observed = M · t`.

use itertools::Itertools;
use log::{debug, info};
use ndarray::{Array1, Array2};

use crate::config::PvcConfig;
use crate::filter::GaussianBlur;
use crate::stats::{observed_means, region_sizes, weighted_sum};
use crate::{solver, Psf, PvcResult, RegionMaskSet, Volume};

/// GTM 及各区域大小. 构建后不可修改.
#[derive(Debug, Clone)]
pub struct TransferMatrix {
    matrix: Array2<f64>,
    region_sizes: Array1<f64>,
}

impl TransferMatrix {
    /// 由 mask 和 PSF 构建 GTM.
    ///
    /// 对每个区域 `j`, 以 PSF 模糊其指示函数; 然后对每个区域 `i`
    /// 计算 `sum(mask_i * blur(mask_j)) / S[i]`.
    ///
    /// 任一区域大小为 0 时返回 `Err(PvcError::DivisionByZero)`.
    pub fn build(masks: &RegionMaskSet, psf: &Psf, config: &PvcConfig) -> PvcResult<Self> {
        let sizes = region_sizes(masks)?;
        let blur = GaussianBlur::new(psf, masks.grid(), config);
        let k = masks.len();

        let columns = spill_columns(masks, &blur, &sizes);
        let mut matrix = Array2::<f64>::zeros((k, k));
        for (j, column) in columns.into_iter().enumerate() {
            matrix.column_mut(j).assign(&column);
            debug!(
                "GTM column {}: [{}]",
                j + 1,
                column.iter().map(|v| format!("{v:.6}")).join(", ")
            );
        }

        Ok(Self {
            matrix,
            region_sizes: sizes,
        })
    }

    /// 直接由矩阵和区域大小创建. 两者维数必须一致, 否则 panic.
    pub fn from_parts(matrix: Array2<f64>, region_sizes: Array1<f64>) -> Self {
        assert!(matrix.is_square(), "GTM 必须是方阵");
        assert_eq!(matrix.nrows(), region_sizes.len(), "GTM 与区域个数不一致");
        Self {
            matrix,
            region_sizes,
        }
    }

    /// `K x K` 矩阵.
    #[inline]
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// 各区域大小.
    #[inline]
    pub fn region_sizes(&self) -> &Array1<f64> {
        &self.region_sizes
    }

    /// 区域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.region_sizes.len()
    }

    /// 是否为空矩阵.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 第 `j` 列: 区域 `j` 模糊后在每个区域内的平均值.
fn spill_column(
    masks: &RegionMaskSet,
    blur: &GaussianBlur,
    sizes: &Array1<f64>,
    j: usize,
) -> Array1<f64> {
    let blurred = blur.apply(masks.region(j));
    masks
        .regions()
        .zip(sizes.iter())
        .map(|(region_i, &size)| weighted_sum(blurred.view(), region_i) / size)
        .collect()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon` 并行地计算每一列.
        fn spill_columns(
            masks: &RegionMaskSet,
            blur: &GaussianBlur,
            sizes: &Array1<f64>,
        ) -> Vec<Array1<f64>> {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..masks.len())
                .into_par_iter()
                .map(|j| spill_column(masks, blur, sizes, j))
                .collect()
        }
    } else {
        fn spill_columns(
            masks: &RegionMaskSet,
            blur: &GaussianBlur,
            sizes: &Array1<f64>,
        ) -> Vec<Array1<f64>> {
            (0..masks.len())
                .map(|j| spill_column(masks, blur, sizes, j))
                .collect()
        }
    }
}

/// 区域级 GTM 校正结果.
#[derive(Debug, Clone)]
pub struct GtmSolution {
    /// GTM 及区域大小.
    pub transfer: TransferMatrix,

    /// 观测区域均值.
    pub observed: Array1<f64>,

    /// 校正后区域均值, 满足 `M · corrected = observed`.
    pub corrected: Array1<f64>,
}

/// 执行区域级 GTM 校正: 构建 GTM, 提取观测均值并求解校正均值.
///
/// mask 与 PET 不对齐时, 在任何数值计算之前返回 `Err(PvcError::InvalidMask)`.
pub fn gtm_pvc(
    pet: &Volume,
    masks: &RegionMaskSet,
    psf: &Psf,
    config: &PvcConfig,
) -> PvcResult<GtmSolution> {
    masks.check_aligned(pet.grid())?;
    info!("Building GTM for {} regions", masks.len());
    let transfer = TransferMatrix::build(masks, psf, config)?;
    let observed = observed_means(pet, masks)?;
    info!("Regional means: {}", format_vector(&observed));
    info!("GTM:\n{}", format_matrix(transfer.matrix()));

    let corrected = solver::solve(&transfer, &observed, config)?;
    info!("Corrected means: {}", format_vector(&corrected));

    Ok(GtmSolution {
        transfer,
        observed,
        corrected,
    })
}

/// 以一行文本展示向量.
pub(crate) fn format_vector(v: &Array1<f64>) -> String {
    v.iter().map(|x| format!("{x:.6}")).join(" ")
}

fn format_matrix(m: &Array2<f64>) -> String {
    m.rows()
        .into_iter()
        .map(|row| row.iter().map(|x| format!("{x:.6}")).join(" "))
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PvcError, ZeroStage};
    use ndarray::Array3;

    /// 沿 x 方向一分为二的两区域 mask, 网格 (6, 6, 16).
    fn split_masks() -> RegionMaskSet {
        let left = Array3::from_shape_fn((6, 6, 16), |(_, _, x)| if x < 8 { 1.0 } else { 0.0 });
        let right = left.mapv(|v| 1.0 - v);
        RegionMaskSet::from_regions(&[left, right], [1.0; 3]).unwrap()
    }

    #[test]
    fn test_zero_psf_is_identity() {
        let masks = split_masks();
        let t = TransferMatrix::build(&masks, &Psf::identity(), &PvcConfig::default()).unwrap();
        assert_eq!(t.len(), 2);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((t.matrix()[(i, j)] - expected).abs() < 1e-12);
            }
        }
        assert_eq!(t.region_sizes()[0], 288.0);
    }

    #[test]
    fn test_diagonal_dominance() {
        let masks = split_masks();
        let psf = Psf::from_fwhm_xyz(3.0, 3.0, 3.0).unwrap();
        let t = TransferMatrix::build(&masks, &psf, &PvcConfig::default()).unwrap();
        let m = t.matrix();
        assert!(m[(0, 1)] > 0.0);
        assert!(m[(1, 0)] > 0.0);
        assert!(m[(0, 0)] > m[(0, 1)]);
        assert!(m[(1, 1)] > m[(1, 0)]);
        // 两区域对称.
        assert!((m[(0, 0)] - m[(1, 1)]).abs() < 1e-5);
        // 区域覆盖整个网格时, 每行之和为 1.
        for i in 0..2 {
            assert!((m.row(i).sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_empty_region() {
        let masks = RegionMaskSet::from_regions(
            &[Array3::ones((3, 3, 3)), Array3::zeros((3, 3, 3))],
            [1.0; 3],
        )
        .unwrap();
        let r = TransferMatrix::build(&masks, &Psf::identity(), &PvcConfig::default());
        assert!(matches!(
            r,
            Err(PvcError::DivisionByZero {
                region: 2,
                stage: ZeroStage::RegionSize
            })
        ));
    }

    #[test]
    fn test_gtm_pvc_recovers_means() {
        let masks = split_masks();
        let psf = Psf::from_fwhm_xyz(4.0, 4.0, 4.0).unwrap();
        let config = PvcConfig::default();

        let truth = Array3::from_shape_fn((6, 6, 16), |(_, _, x)| if x < 8 { 100.0 } else { 10.0 });
        let blurred = GaussianBlur::new(&psf, masks.grid(), &config).apply(truth.view());
        let pet = Volume::from_array(blurred, [1.0; 3]);

        let sol = gtm_pvc(&pet, &masks, &psf, &config).unwrap();
        assert!(sol.observed[0] < 100.0);
        assert!(sol.observed[1] > 10.0);
        assert!((sol.corrected[0] - 100.0).abs() < 1e-2);
        assert!((sol.corrected[1] - 10.0).abs() < 1e-2);

        // 区域信号总量守恒.
        let s = sol.transfer.region_sizes();
        let before: f64 = (&sol.observed * s).sum();
        let after: f64 = (&sol.corrected * s).sum();
        assert!((before - after).abs() / before < 1e-4);
    }
}
