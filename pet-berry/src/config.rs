//! 数值参数.

use crate::consts::{DEFAULT_KERNEL_MAX_ERROR, DEFAULT_MAX_CONDITION, DEFAULT_MAX_KERNEL_WIDTH};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 校正运行的数值参数.
///
/// 该结构是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PvcConfig {
    /// GTM 允许的最大条件数.
    pub max_condition: f64,

    /// 高斯核截断处相对峰值的最大误差, 范围 `(0, 1)`.
    pub kernel_max_error: f64,

    /// 高斯核单轴最大宽度 (抽头个数), 至少为 1.
    pub max_kernel_width: usize,
}

impl Default for PvcConfig {
    fn default() -> Self {
        Self {
            max_condition: DEFAULT_MAX_CONDITION,
            kernel_max_error: DEFAULT_KERNEL_MAX_ERROR,
            max_kernel_width: DEFAULT_MAX_KERNEL_WIDTH,
        }
    }
}

impl PvcConfig {
    /// 检查参数是否在合理范围内. 不合理时返回描述问题的字符串.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_condition.is_finite() && self.max_condition >= 1.0) {
            return Err(format!(
                "max_condition must be a finite number >= 1, got {}",
                self.max_condition
            ));
        }
        if !(0.0 < self.kernel_max_error && self.kernel_max_error < 1.0) {
            return Err(format!(
                "kernel_max_error must be in (0, 1), got {}",
                self.kernel_max_error
            ));
        }
        if self.max_kernel_width == 0 {
            return Err("max_kernel_width must be at least 1".to_string());
        }
        Ok(())
    }
}
