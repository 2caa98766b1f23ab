//! Iterative Yang 校正.
//!
//! 参考论文: Erlandsson, K. et al. (2012). "A review of partial volume correction
//! techniques for emission tomography and their applications in neurology,
//! cardiology and oncology". Physics in Medicine and Biology, 57(21):R119-R159.
//!
//! 每次迭代: 模糊当前估计, 求各区域 "真实均值 / 模糊均值" 比值,
//! 以比值合成校正场并逐体素乘到当前估计上. 迭代次数固定, 不提前终止.

use log::{debug, info};
use ndarray::Array1;

use crate::config::PvcConfig;
use crate::consts::DEFAULT_ITERATIONS;
use crate::data::zip_map;
use crate::filter::GaussianBlur;
use crate::gtm::format_vector;
use crate::stats::{region_sizes, regional_means};
use crate::synth::synthesize;
use crate::{Psf, PvcError, PvcResult, RegionMaskSet, Volume, ZeroStage};

/// Iterative Yang 校正器.
///
/// 不属于任何区域的体素, 其校正场为 0, 第一次迭代后即被置 0.
#[derive(Debug, Clone)]
pub struct IterativeYang {
    psf: Psf,
    iterations: usize,
    verbose: bool,
    config: PvcConfig,
}

/// 带迭代记录的校正结果.
#[derive(Debug, Clone)]
pub struct YangOutcome {
    /// 最终估计.
    pub estimate: Volume,

    /// 每次迭代的区域比值 `真实均值 / 模糊均值`. 长度等于迭代次数.
    pub ratios: Vec<Array1<f64>>,
}

impl IterativeYang {
    /// 以默认迭代次数 ([`DEFAULT_ITERATIONS`]) 和默认参数创建.
    pub fn new(psf: Psf) -> Self {
        Self {
            psf,
            iterations: DEFAULT_ITERATIONS,
            verbose: false,
            config: PvcConfig::default(),
        }
    }

    /// 设置迭代次数. 0 表示原样返回输入.
    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    /// 是否在 `info` 级别输出每次迭代的区域比值. 不影响计算结果.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// 设置数值参数.
    pub fn config(mut self, config: PvcConfig) -> Self {
        self.config = config;
        self
    }

    /// 执行校正, 返回最终估计.
    pub fn run(&self, pet: &Volume, masks: &RegionMaskSet) -> PvcResult<Volume> {
        self.run_traced(pet, masks).map(|o| o.estimate)
    }

    /// 执行校正, 同时返回每次迭代的区域比值.
    ///
    /// - mask 与 PET 不对齐时返回 `Err(PvcError::InvalidMask)`;
    /// - 区域大小为 0, 或某次迭代中区域的模糊均值为 0 时返回
    ///   `Err(PvcError::DivisionByZero)`.
    pub fn run_traced(&self, pet: &Volume, masks: &RegionMaskSet) -> PvcResult<YangOutcome> {
        masks.check_aligned(pet.grid())?;
        let sizes = region_sizes(masks)?;
        let true_means = regional_means(pet.data(), masks, &sizes)?;
        let blur = GaussianBlur::new(&self.psf, pet.grid(), &self.config);
        debug!("True regional means: {}", format_vector(&true_means));

        let mut estimate = pet.clone();
        let mut ratios = Vec::with_capacity(self.iterations);
        for iteration in 1..=self.iterations {
            let blurred = blur.apply(estimate.data());
            let blurred_means = regional_means(blurred.view(), masks, &sizes)?;
            if let Some(k) = blurred_means.iter().position(|&m| m == 0.0) {
                return Err(PvcError::DivisionByZero {
                    region: k + 1,
                    stage: ZeroStage::BlurredMean { iteration },
                });
            }

            let ratio = &true_means / &blurred_means;
            if self.verbose {
                info!("Iteration {iteration}: {}", format_vector(&ratio));
            } else {
                debug!("Iteration {iteration}: {}", format_vector(&ratio));
            }

            let field = synthesize(masks, &ratio)?;
            let next = zip_map(estimate.data(), field.view(), |e, f| e * f);
            estimate = estimate.with_data(next)?;
            ratios.push(ratio);
        }

        Ok(YangOutcome { estimate, ratios })
    }
}
