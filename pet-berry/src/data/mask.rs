//! 多区域 mask.

use std::path::Path;

use ndarray::{Array3, Array4, ArrayD, ArrayView3, Axis, Ix4};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use super::{get_spacing_from_header, squeeze_trailing, Grid, Volume};
use crate::consts::MASK_VALUE_TOLERANCE;
use crate::{Axes3, MaskDefect, PvcError, PvcResult};

/// 共享同一体素网格的一组区域 mask. 每个区域一个通道, 体素值位于 `[0, 1]`
/// (二值或模糊隶属度).
///
/// 区域在内部按 (k, z, y, x) 连续存储. 对外的区域编号 (错误信息, 日志)
/// 从 1 开始, 而 [`Self::region`] 等访问接口的索引从 0 开始.
///
/// 该结构创建后不可修改.
#[derive(Debug, Clone)]
pub struct RegionMaskSet {
    grid: Grid,
    data: Array4<f32>,
}

impl RegionMaskSet {
    /// 打开 nii 文件格式的 4D mask, 第 4 维为区域.
    ///
    /// 文件无法读取时返回 `Err(PvcError::Io)`; mask 不是 4D, 不含区域或
    /// 含有 `[0, 1]` 之外的值时返回 `Err(PvcError::InvalidMask)`.
    pub fn open<P: AsRef<Path>>(path: P) -> PvcResult<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| PvcError::io(path, e))?;
        let spacing = get_spacing_from_header(obj.header());
        let raw = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| PvcError::io(path, e))?;
        Self::from_nifti_order(squeeze_trailing(raw, 4), spacing)
    }

    /// 由 nifti 惯用的 \[x, y, z, k\] 顺序数组创建. `spacing` 按 (z, y, x) 组织.
    ///
    /// 数组不是 4D 时返回 `Err(PvcError::InvalidMask(MaskDefect::NotFourDimensional))`.
    pub fn from_nifti_order(raw: ArrayD<f32>, spacing: Axes3) -> PvcResult<Self> {
        let ndim = raw.ndim();
        let Ok(raw) = raw.into_dimensionality::<Ix4>() else {
            return Err(MaskDefect::NotFourDimensional(ndim).into());
        };
        // [x, y, z, k] -> [k, z, y, x].
        let data = raw.permuted_axes([3, 2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Self::from_array(data, spacing)
    }

    /// 由 (k, z, y, x) 组织的数组创建.
    pub fn from_array(data: Array4<f32>, spacing: Axes3) -> PvcResult<Self> {
        let (k, z, y, x) = data.dim();
        if k == 0 {
            return Err(MaskDefect::NoRegion.into());
        }
        Self::check_values(&data)?;
        Ok(Self {
            grid: Grid::new((z, y, x), spacing),
            data,
        })
    }

    /// 由若干 (z, y, x) 组织的区域创建. 所有区域形状必须一致, 否则返回
    /// `Err(PvcError::GridMismatch)`.
    pub fn from_regions(regions: &[Array3<f32>], spacing: Axes3) -> PvcResult<Self> {
        if regions.is_empty() {
            return Err(MaskDefect::NoRegion.into());
        }
        let views: Vec<ArrayView3<f32>> = regions.iter().map(|r| r.view()).collect();
        let data = ndarray::stack(Axis(0), &views).map_err(|_| PvcError::GridMismatch)?;
        Self::from_array(data, spacing)
    }

    /// 检查所有体素值是否有限且位于 `[0, 1]` (允许微小浮点误差).
    fn check_values(data: &Array4<f32>) -> PvcResult<()> {
        let range = -MASK_VALUE_TOLERANCE..=(1.0 + MASK_VALUE_TOLERANCE);
        for (k, region) in data.axis_iter(Axis(0)).enumerate() {
            if let Some(&value) = region.iter().find(|v| !range.contains(*v)) {
                return Err(MaskDefect::ValueOutOfRange {
                    region: k + 1,
                    value,
                }
                .into());
            }
        }
        Ok(())
    }

    /// 确认 mask 与 PET 网格一致. 否则返回 `Err(PvcError::InvalidMask)`.
    pub fn check_aligned(&self, pet: &Grid) -> PvcResult<()> {
        if !self.grid.same_shape(pet) {
            return Err(MaskDefect::ShapeMismatch(self.grid.shape(), pet.shape()).into());
        }
        if !self.grid.same_spacing(pet) {
            return Err(MaskDefect::SpacingMismatch(self.grid.spacing(), pet.spacing()).into());
        }
        Ok(())
    }

    /// 区域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 是否不含区域. 由构造保证总为 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 网格描述.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 获取第 `index` 个区域 (从 0 开始) 的视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn region(&self, index: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    /// 获取能按区域顺序迭代的迭代器.
    #[inline]
    pub fn regions(&self) -> impl ExactSizeIterator<Item = ArrayView3<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }

    /// 将第 `index` 个区域 (从 0 开始) 提取为独立图像.
    ///
    /// 当 `index` 越界时 panic.
    pub fn extract(&self, index: usize) -> Volume {
        Volume::from_array(self.region(index).to_owned(), self.grid.spacing())
    }
}
