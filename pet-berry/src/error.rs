//! 运行时错误.
//!
//! 所有错误对一次校正运行都是终结性的: 它们要么来自格式错误的输入,
//! 要么来自病态的校正问题, 重试没有意义.

use std::path::PathBuf;

use ndarray_linalg::error::LinalgError;
use nifti::NiftiError;
use thiserror::Error;

use crate::Idx3d;

/// 校正运行结果.
pub type PvcResult<T> = Result<T, PvcError>;

/// mask 不合法的具体原因.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskDefect {
    /// mask 不是 4D (3D 网格 + 区域轴). 参数为实际维数.
    NotFourDimensional(usize),

    /// mask 不包含任何区域.
    NoRegion,

    /// mask 网格形状与 PET 不一致. 第一个参数为 mask 形状, 第二个为 PET 形状.
    ShapeMismatch(Idx3d, Idx3d),

    /// mask 体素分辨率与 PET 不一致 (毫米, (z, y, x)).
    SpacingMismatch([f64; 3], [f64; 3]),

    /// 第 `region` 个区域 (从 1 开始) 中存在不在 `[0, 1]` 内或非有限的体素值.
    ValueOutOfRange {
        /// 区域编号, 从 1 开始.
        region: usize,
        /// 违规值.
        value: f32,
    },
}

impl std::fmt::Display for MaskDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFourDimensional(n) => write!(f, "mask must be 4-D, got {n}-D"),
            Self::NoRegion => write!(f, "mask contains no region"),
            Self::ShapeMismatch(m, p) => write!(f, "mask grid {m:?} does not match PET grid {p:?}"),
            Self::SpacingMismatch(m, p) => {
                write!(f, "mask spacing {m:?} mm does not match PET spacing {p:?} mm")
            }
            Self::ValueOutOfRange { region, value } => {
                write!(f, "region {region} has value {value} outside [0, 1]")
            }
        }
    }
}

/// 校正过程中产生 `DivisionByZero` 的阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ZeroStage {
    /// 区域体素个数 (或模糊权重和) 为 0.
    RegionSize,

    /// Iterative Yang 某次迭代中, 区域的模糊后均值为 0.
    BlurredMean {
        /// 迭代序号, 从 1 开始.
        iteration: usize,
    },
}

impl std::fmt::Display for ZeroStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegionSize => write!(f, "region size is zero"),
            Self::BlurredMean { iteration } => {
                write!(f, "blurred regional mean is zero at iteration {iteration}")
            }
        }
    }
}

/// PVC 运行时错误.
#[derive(Debug, Error)]
pub enum PvcError {
    /// 读写 nifti 文件错误.
    #[error("cannot access image file `{}`: {source}", path.display())]
    Io {
        /// 出错的文件路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: NiftiError,
    },

    /// 图像不是 3D 体数据 (去掉末尾长度为 1 的轴之后).
    #[error("image file `{}` is not a 3-D volume ({ndim}-D)", path.display())]
    NotVolume {
        /// 文件路径.
        path: PathBuf,
        /// 实际维数.
        ndim: usize,
    },

    /// mask 维数, 区域个数或网格与 PET 不符.
    #[error("invalid mask: {0}")]
    InvalidMask(MaskDefect),

    /// 退化区域. `region` 从 1 开始编号.
    #[error("division by zero in region {region}: {stage}")]
    DivisionByZero {
        /// 区域编号, 从 1 开始.
        region: usize,
        /// 出错阶段.
        stage: ZeroStage,
    },

    /// GTM 奇异或条件数过大.
    #[error("transfer matrix is singular or ill-conditioned (condition number {condition:e})")]
    SingularMatrix {
        /// 矩阵条件数. 奇异时为 `inf`.
        condition: f64,
    },

    /// 底层 LAPACK 错误.
    #[error("linear algebra failure: {0}")]
    Linalg(#[from] LinalgError),

    /// 向量长度与区域个数不符.
    #[error("expected {expected} regional values, got {actual}")]
    LengthMismatch {
        /// 区域个数.
        expected: usize,
        /// 实际长度.
        actual: usize,
    },

    /// 逐元素运算的两个图像不在同一网格上.
    #[error("volumes are not on the same grid")]
    GridMismatch,

    /// 图像某一轴过长, 无法写入 nifti header.
    #[error("image axis of length {len} exceeds the nifti header limit of 65535")]
    AxisTooLong {
        /// 轴长度.
        len: usize,
    },

    /// 参数文件无法读取或参数不合法.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<MaskDefect> for PvcError {
    #[inline]
    fn from(d: MaskDefect) -> Self {
        Self::InvalidMask(d)
    }
}

impl PvcError {
    /// 包装 nifti 错误, 同时记录文件路径.
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: NiftiError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
