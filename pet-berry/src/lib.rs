#![warn(missing_docs)]

//! 核心库. 提供 PET 图像部分容积校正 (Partial Volume Correction, PVC)
//! 的数据结构和数值算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 一次校正运行中, PET 图像与所有区域 mask 必须位于同一体素网格上
//!   (形状与体素分辨率都一致), 否则相关操作返回 `Err`.
//! 2. 所有中间结果 (mask, 矩阵, 均值向量, 图像) 在产生后均不再修改.
//!   因此多个相互独立的运行可以安全地并行执行.
//!
//! # 功能
//!
//! ### 几何传递矩阵 (GTM) ✅
//!
//! 计算各区域在 PSF 模糊下相互 "溢出" 的比例矩阵, 以及各区域体素个数.
//!
//! 实现位于 `pet-berry/src/gtm.rs`.
//!
//! ### 区域均值与线性求解 ✅
//!
//! 从 PET 图像中提取各区域观测均值, 并求解 `M · x = observed`.
//! 求解前检查矩阵条件数, 病态矩阵直接报错.
//!
//! 实现位于 `pet-berry/src/stats.rs`, `pet-berry/src/solver.rs`.
//!
//! ### RBV (region-based voxel-wise) 校正 ✅
//!
//! 用 GTM 校正后的区域均值合成伪 PET 图像, 以 `合成 / 模糊(合成)`
//! 作为体素级校正因子.
//!
//! 实现位于 `pet-berry/src/rbv.rs`, `pet-berry/src/synth.rs`.
//!
//! ### Iterative Yang 校正 ✅
//!
//! 固定次数的 "模糊 -> 区域比值 -> 体素缩放" 迭代, 不需要显式矩阵求逆.
//!
//! 实现位于 `pet-berry/src/yang.rs`.
//!
//! ### 高斯模糊 ✅
//!
//! 可分离离散高斯卷积, 边界按零通量 (复制边缘) 处理.
//! 开启 `rayon` feature 时按行并行.
//!
//! 实现位于 `pet-berry/src/filter`.

/// 三维索引, 按 (z, y, x) 组织.
pub type Idx3d = (usize, usize, usize);

/// 每个轴上的物理量, 按 (z, y, x) 组织.
pub type Axes3 = [f64; 3];

pub mod consts;

pub mod config;

mod error;

pub use error::{MaskDefect, PvcError, PvcResult, ZeroStage};

/// 图像, 网格, mask 和 PSF 基础数据结构.
pub mod data;

pub use data::{Grid, Psf, RegionMaskSet, Volume};

pub mod filter;

pub mod gtm;

pub mod stats;

pub mod solver;

pub mod synth;

pub mod rbv;

pub mod yang;

pub mod prelude;
