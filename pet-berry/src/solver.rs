//! 线性求解: 由观测区域均值恢复真实区域均值.

use log::debug;
use ndarray::{Array1, Array2};
use ndarray_linalg::{Solve, SVD};

use crate::config::PvcConfig;
use crate::gtm::TransferMatrix;
use crate::{PvcError, PvcResult};

/// 矩阵 2-范数条件数 `sigma_max / sigma_min`. 奇异时为 `inf`.
pub fn condition_number(m: &Array2<f64>) -> PvcResult<f64> {
    let (_, s, _) = m.svd(false, false)?;
    let max = s.iter().copied().fold(0.0, f64::max);
    let min = s.iter().copied().fold(f64::INFINITY, f64::min);
    if min > 0.0 {
        Ok(max / min)
    } else {
        Ok(f64::INFINITY)
    }
}

/// 求解 `M · corrected = observed` (LU 分解).
///
/// - `observed` 长度与区域个数不符时返回 `Err(PvcError::LengthMismatch)`;
/// - 矩阵奇异, 条件数为 `NaN` 或超过 `config.max_condition` 时返回
///   `Err(PvcError::SingularMatrix)`.
pub fn solve(
    transfer: &TransferMatrix,
    observed: &Array1<f64>,
    config: &PvcConfig,
) -> PvcResult<Array1<f64>> {
    if observed.len() != transfer.len() {
        return Err(PvcError::LengthMismatch {
            expected: transfer.len(),
            actual: observed.len(),
        });
    }

    let condition = condition_number(transfer.matrix())?;
    debug!("GTM condition number: {condition:e}");
    // NaN 也在这里被拒绝.
    if !(condition <= config.max_condition) {
        return Err(PvcError::SingularMatrix { condition });
    }

    Ok(transfer.matrix().solve(observed)?)
}
