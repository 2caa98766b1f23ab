use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView3, Axis, Ix3, Zip};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::SPACING_TOLERANCE;
use crate::{Axes3, Idx3d, PvcError, PvcResult};

pub mod mask;
pub mod psf;

pub use mask::RegionMaskSet;
pub use psf::Psf;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 nifti 的 (x, y, z) 形状转换成 (z, y, x). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    let [_, x, y, z, ..] = h.dim;
    (z as usize, y as usize, x as usize)
}

/// 将 nifti 的 (x, y, z) 体素分辨率转换成 (z, y, x).
#[inline]
fn get_spacing_from_header(h: &NiftiHeader) -> Axes3 {
    let [_, x, y, z, ..] = h.pixdim;
    [z as f64, y as f64, x as f64]
}

/// 体素网格描述: 形状和每个轴上的体素分辨率 (毫米). 均按照 (z, y, x) 组织.
///
/// 一次校正运行中所有图像都必须位于同一个网格上.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Grid {
    shape: Idx3d,
    spacing: Axes3,
}

impl Grid {
    /// 构建网格.
    #[inline]
    pub const fn new(shape: Idx3d, spacing: Axes3) -> Self {
        Self { shape, spacing }
    }

    /// 从 nifti header 读取网格.
    #[inline]
    pub fn from_header(h: &NiftiHeader) -> Self {
        Self::new(get_shape_from_header(h), get_spacing_from_header(h))
    }

    /// 网格形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 体素分辨率, 以毫米为单位.
    #[inline]
    pub fn spacing(&self) -> Axes3 {
        self.spacing
    }

    /// 体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, y, x) = self.shape;
        z * y * x
    }

    /// 两个网格的形状是否一致.
    #[inline]
    pub fn same_shape(&self, other: &Grid) -> bool {
        self.shape == other.shape
    }

    /// 两个网格的体素分辨率是否一致 (允许 [`SPACING_TOLERANCE`] 的误差).
    #[inline]
    pub fn same_spacing(&self, other: &Grid) -> bool {
        self.spacing
            .iter()
            .zip(other.spacing.iter())
            .all(|(a, b)| (a - b).abs() <= SPACING_TOLERANCE)
    }

    /// 是否为同一个网格.
    #[inline]
    pub fn same_as(&self, other: &Grid) -> bool {
        self.same_shape(other) && self.same_spacing(other)
    }
}

/// 3D 图像, 包括网格描述和体素值. 体素值以 `f32` 保存, 按 (z, y, x) 访问.
///
/// 从文件打开的图像会保留原始 nifti header, 保存时沿用其空间方向等元信息.
#[derive(Debug, Clone)]
pub struct Volume {
    header: Option<BoxedHeader>,
    grid: Grid,
    data: Array3<f32>,
}

impl Index<Idx3d> for Volume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

/// 去掉 nifti 数组末尾长度为 1 的轴 (例如只有一帧的 4D PET).
pub(crate) fn squeeze_trailing(mut raw: ArrayD<f32>, min_ndim: usize) -> ArrayD<f32> {
    while raw.ndim() > min_ndim && raw.shape()[raw.ndim() - 1] == 1 {
        let last = raw.ndim() - 1;
        raw = raw.index_axis_move(Axis(last), 0);
    }
    raw
}

impl Volume {
    /// 打开 nii 文件格式的 3D 图像. `path` 为 nii (或 nii.gz) 文件的本地路径.
    ///
    /// 文件无法读取时返回 `Err(PvcError::Io)`; 去掉末尾单例轴后仍不是 3D
    /// 时返回 `Err(PvcError::NotVolume)`.
    pub fn open<P: AsRef<Path>>(path: P) -> PvcResult<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| PvcError::io(path, e))?;
        let header = Box::new(obj.header().clone());
        let raw = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| PvcError::io(path, e))?;

        let raw = squeeze_trailing(raw, 3);
        let ndim = raw.ndim();
        let Ok(data) = raw.into_dimensionality::<Ix3>() else {
            return Err(PvcError::NotVolume {
                path: path.to_path_buf(),
                ndim,
            });
        };

        // [x, y, z] -> [z, y, x].
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };

        let grid = Grid::new(data.dim(), get_spacing_from_header(&header));
        Ok(Self {
            header: Some(header),
            grid,
            data,
        })
    }

    /// 直接由 (z, y, x) 组织的数据和体素分辨率创建图像. 该图像没有 nifti header.
    #[inline]
    pub fn from_array(data: Array3<f32>, spacing: Axes3) -> Self {
        let grid = Grid::new(data.dim(), spacing);
        Self {
            header: None,
            grid,
            data,
        }
    }

    /// 在网格 `grid` 上创建图像. 如果 `data` 的形状与网格不符, 返回
    /// `Err(PvcError::GridMismatch)`.
    pub fn from_grid(grid: Grid, data: Array3<f32>) -> PvcResult<Self> {
        if data.dim() != grid.shape() {
            return Err(PvcError::GridMismatch);
        }
        Ok(Self {
            header: None,
            grid,
            data,
        })
    }

    /// 以 `self` 的网格和 header 包装新数据. 形状不符时返回 `Err`.
    pub fn with_data(&self, data: Array3<f32>) -> PvcResult<Self> {
        if data.dim() != self.grid.shape() {
            return Err(PvcError::GridMismatch);
        }
        Ok(Self {
            header: self.header.clone(),
            grid: self.grid,
            data,
        })
    }

    /// 保存为 nii 文件. 如果路径以 `.gz` 结尾, 则写入 gzip 压缩格式.
    ///
    /// 若图像来自文件, 则沿用原 header 的空间信息; 数据类型总为 `f32`,
    /// 且不再带有缩放系数.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PvcResult<()> {
        let path = path.as_ref();
        let mut header = match &self.header {
            Some(h) => h.as_ref().clone(),
            None => self.fake_header()?,
        };
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;

        // [z, y, x] -> [x, y, z].
        let data = self.data.view().permuted_axes([2, 1, 0]);
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&data)
            .map_err(|e| PvcError::io(path, e))
    }

    /// 为没有 header 的图像生成最小 header: 只包含形状和体素分辨率.
    ///
    /// 任一轴长度超出 header 能表示的范围时返回 `Err(PvcError::AxisTooLong)`.
    fn fake_header(&self) -> PvcResult<NiftiHeader> {
        let axis = |len: usize| u16::try_from(len).map_err(|_| PvcError::AxisTooLong { len });
        let (z, y, x) = self.grid.shape();
        let mut header = NiftiHeader::default();
        header.dim = [3, axis(x)?, axis(y)?, axis(z)?, 1, 1, 1, 1];
        let [sz, sy, sx] = self.grid.spacing();
        header.pixdim = [1.0, sx as f32, sy as f32, sz as f32, 1.0, 1.0, 1.0, 1.0];
        Ok(header)
    }

    /// 网格描述.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.grid.shape()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 所有体素值之和.
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    /// 逐体素相乘. 结果沿用 `self` 的 header.
    #[inline]
    pub fn mul(&self, rhs: &Volume) -> PvcResult<Volume> {
        self.zip_with(rhs, |a, b| a * b)
    }

    /// 逐体素相除. 结果沿用 `self` 的 header.
    ///
    /// 除数为 0 的体素按 IEEE 浮点规则得到 `inf` 或 `NaN`, 不做特殊处理.
    #[inline]
    pub fn div(&self, rhs: &Volume) -> PvcResult<Volume> {
        self.zip_with(rhs, |a, b| a / b)
    }

    /// 逐体素相加. 结果沿用 `self` 的 header.
    #[inline]
    pub fn add(&self, rhs: &Volume) -> PvcResult<Volume> {
        self.zip_with(rhs, |a, b| a + b)
    }

    /// 所有体素乘以标量 `k`.
    pub fn scale(&self, k: f32) -> Volume {
        Self {
            header: self.header.clone(),
            grid: self.grid,
            data: self.data.mapv(|v| v * k),
        }
    }

    /// 将 `self` 与 `rhs` 逐体素合并. 两者必须位于同一网格.
    fn zip_with<F>(&self, rhs: &Volume, op: F) -> PvcResult<Volume>
    where
        F: Fn(f32, f32) -> f32 + Sync + Send,
    {
        if !self.grid.same_as(&rhs.grid) {
            return Err(PvcError::GridMismatch);
        }
        let data = zip_map(self.data.view(), rhs.data.view(), op);
        self.with_data(data)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon` 并行地逐元素合并两个同形状数组.
        pub(crate) fn zip_map<F>(a: ArrayView3<f32>, b: ArrayView3<f32>, op: F) -> Array3<f32>
        where
            F: Fn(f32, f32) -> f32 + Sync + Send,
        {
            Zip::from(&a).and(&b).par_map_collect(|&x, &y| op(x, y))
        }
    } else {
        /// 逐元素合并两个同形状数组.
        pub(crate) fn zip_map<F>(a: ArrayView3<f32>, b: ArrayView3<f32>, op: F) -> Array3<f32>
        where
            F: Fn(f32, f32) -> f32 + Sync + Send,
        {
            Zip::from(&a).and(&b).map_collect(|&x, &y| op(x, y))
        }
    }
}
