//! 区域统计: 区域大小与区域均值.

use ndarray::{Array1, ArrayView3, Zip};

use crate::{PvcError, PvcResult, RegionMaskSet, Volume, ZeroStage};

/// 计算 `sum(data * weights)`, 以 `f64` 累加.
///
/// 两者形状必须一致, 否则 panic.
pub fn weighted_sum(data: ArrayView3<f32>, weights: ArrayView3<f32>) -> f64 {
    Zip::from(&data)
        .and(&weights)
        .fold(0.0, |acc, &v, &w| acc + v as f64 * w as f64)
}

/// 计算每个区域的大小 (二值 mask 为体素个数, 模糊 mask 为隶属度之和).
///
/// 任一区域大小为 0 时返回 `Err(PvcError::DivisionByZero)`.
pub fn region_sizes(masks: &RegionMaskSet) -> PvcResult<Array1<f64>> {
    let sizes: Array1<f64> = masks
        .regions()
        .map(|r| r.iter().map(|&v| v as f64).sum::<f64>())
        .collect();
    if let Some(k) = sizes.iter().position(|&s| s == 0.0) {
        return Err(PvcError::DivisionByZero {
            region: k + 1,
            stage: ZeroStage::RegionSize,
        });
    }
    Ok(sizes)
}

/// 计算 `data` 在每个区域内的加权和.
///
/// `data` 必须与 mask 位于同一网格, 否则 panic.
pub fn regional_sums(data: ArrayView3<f32>, masks: &RegionMaskSet) -> Array1<f64> {
    masks.regions().map(|r| weighted_sum(data, r)).collect()
}

/// 计算 `data` 在每个区域内的均值: `sum(data * mask_j) / sizes[j]`.
///
/// `sizes` 应来自 [`region_sizes`] (或 GTM 构建结果), 保证区域顺序一致.
/// `sizes` 长度不等于区域个数时返回 `Err(PvcError::LengthMismatch)`,
/// 存在为 0 的区域大小时返回 `Err(PvcError::DivisionByZero)`.
pub fn regional_means(
    data: ArrayView3<f32>,
    masks: &RegionMaskSet,
    sizes: &Array1<f64>,
) -> PvcResult<Array1<f64>> {
    if sizes.len() != masks.len() {
        return Err(PvcError::LengthMismatch {
            expected: masks.len(),
            actual: sizes.len(),
        });
    }
    if let Some(k) = sizes.iter().position(|&s| s == 0.0) {
        return Err(PvcError::DivisionByZero {
            region: k + 1,
            stage: ZeroStage::RegionSize,
        });
    }
    Ok(regional_sums(data, masks) / sizes)
}

/// 从 PET 图像中提取各区域观测均值. mask 必须与 PET 对齐.
pub fn observed_means(pet: &Volume, masks: &RegionMaskSet) -> PvcResult<Array1<f64>> {
    masks.check_aligned(pet.grid())?;
    let sizes = region_sizes(masks)?;
    regional_means(pet.data(), masks, &sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MaskDefect;
    use ndarray::{array, Array3};

    fn two_halves() -> RegionMaskSet {
        let left = Array3::from_shape_fn((2, 2, 4), |(_, _, x)| if x < 2 { 1.0 } else { 0.0 });
        let right = left.mapv(|v| 1.0 - v);
        RegionMaskSet::from_regions(&[left, right], [1.0; 3]).unwrap()
    }

    #[test]
    fn test_sizes_and_means() {
        let masks = two_halves();
        let sizes = region_sizes(&masks).unwrap();
        assert_eq!(sizes, array![8.0, 8.0]);

        let pet = Array3::from_shape_fn((2, 2, 4), |(_, _, x)| if x < 2 { 10.0 } else { 4.0 });
        let pet = Volume::from_array(pet, [1.0; 3]);
        let means = observed_means(&pet, &masks).unwrap();
        assert!((means[0] - 10.0).abs() < 1e-12);
        assert!((means[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_fuzzy_weights() {
        let a = Array3::from_elem((1, 1, 4), 0.25);
        let masks = RegionMaskSet::from_regions(&[a], [1.0; 3]).unwrap();
        assert_eq!(region_sizes(&masks).unwrap(), array![1.0]);
        let data = Array3::from_elem((1, 1, 4), 8.0);
        let means = regional_means(data.view(), &masks, &array![1.0]).unwrap();
        assert!((means[0] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_region_is_division_by_zero() {
        let masks = RegionMaskSet::from_regions(
            &[Array3::ones((2, 2, 2)), Array3::zeros((2, 2, 2))],
            [1.0; 3],
        )
        .unwrap();
        let r = region_sizes(&masks);
        assert!(matches!(
            r,
            Err(PvcError::DivisionByZero {
                region: 2,
                stage: ZeroStage::RegionSize
            })
        ));

        let data = Array3::ones((2, 2, 2));
        let r = regional_means(data.view(), &masks, &array![8.0, 0.0]);
        assert!(matches!(r, Err(PvcError::DivisionByZero { region: 2, .. })));
    }

    #[test]
    fn test_length_mismatch() {
        let masks = two_halves();
        let data = Array3::ones((2, 2, 4));
        let r = regional_means(data.view(), &masks, &array![8.0]);
        assert!(matches!(
            r,
            Err(PvcError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_misaligned_pet() {
        let masks = two_halves();
        let pet = Volume::from_array(Array3::ones((2, 2, 5)), [1.0; 3]);
        assert!(matches!(
            observed_means(&pet, &masks),
            Err(PvcError::InvalidMask(MaskDefect::ShapeMismatch(..)))
        ));
    }
}
