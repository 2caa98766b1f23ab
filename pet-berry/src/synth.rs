//! 合成图像: 用区域值 "涂抹" 各区域.

use ndarray::{Array1, Array3, Zip};

use crate::{PvcError, PvcResult, RegionMaskSet, Volume};

/// 合成体素值 `sum_j values[j] * mask_j(voxel)`.
///
/// 对互不重叠的二值 mask, 即把每个区域涂成对应的值; 模糊或重叠 mask
/// 按权重相加. 不属于任何区域的体素值为 0.
///
/// `values` 长度与区域个数不符时返回 `Err(PvcError::LengthMismatch)`.
pub fn synthesize(masks: &RegionMaskSet, values: &Array1<f64>) -> PvcResult<Array3<f32>> {
    if values.len() != masks.len() {
        return Err(PvcError::LengthMismatch {
            expected: masks.len(),
            actual: values.len(),
        });
    }

    let mut acc = Array3::<f64>::zeros(masks.grid().shape());
    for (region, &value) in masks.regions().zip(values.iter()) {
        Zip::from(&mut acc)
            .and(&region)
            .for_each(|a, &m| *a += value * m as f64);
    }
    Ok(acc.mapv(|v| v as f32))
}

/// 与 [`synthesize`] 相同, 但结果包装为 mask 网格上的图像.
pub fn synthetic_volume(masks: &RegionMaskSet, values: &Array1<f64>) -> PvcResult<Volume> {
    Volume::from_grid(*masks.grid(), synthesize(masks, values)?)
}
