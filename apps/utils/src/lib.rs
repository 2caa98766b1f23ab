//! PVC 命令行工具依赖的通用组件.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Args;
use log::{info, LevelFilter};
use pet_berry::prelude::*;
use simple_logger::SimpleLogger;

pub mod loader;

/// 各工具引用的文献.
pub const CITATION: &str = "\
Please cite:
  Thomas, B. A., et al. (2016). PETPVC: a toolbox for performing partial volume
  correction techniques in positron emission tomography. Physics in Medicine and
  Biology, 61(22), 7975-7993.";

/// 所有校正模式共用的命令行参数.
#[derive(Debug, Clone, Args)]
pub struct PvcArgs {
    /// PET image file (.nii or .nii.gz)
    pub pet: PathBuf,

    /// 4-D region mask file, one region per volume
    pub mask: PathBuf,

    /// Output file
    pub output: PathBuf,

    /// FWHM of the PSF along x, in mm
    #[arg(short = 'x', long = "FWHMx")]
    pub fwhm_x: f64,

    /// FWHM of the PSF along y, in mm
    #[arg(short = 'y', long = "FWHMy")]
    pub fwhm_y: f64,

    /// FWHM of the PSF along z, in mm
    #[arg(short = 'z', long = "FWHMz")]
    pub fwhm_z: f64,

    /// Print debug information
    #[arg(short, long)]
    pub debug: bool,
}

impl PvcArgs {
    /// 由三个 FWHM 构建 PSF. 值为负或非有限时返回 `Err(PvcError::Config)`.
    pub fn psf(&self) -> PvcResult<Psf> {
        Psf::from_fwhm_xyz(self.fwhm_x, self.fwhm_y, self.fwhm_z).ok_or_else(|| {
            PvcError::Config(format!(
                "FWHM must be finite and non-negative, got ({}, {}, {}) mm",
                self.fwhm_x, self.fwhm_y, self.fwhm_z
            ))
        })
    }
}

/// 安装日志. 默认 `Info` 级别, `debug` 为真时为 `Debug` 级别.
pub fn init_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // 只会在同一进程中重复安装时失败, 此时沿用已有的日志.
    let _ = SimpleLogger::new().with_level(level).init();
}

/// 一次运行中可能失败的阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// 读取参数文件或解析参数.
    Config,
    /// 读取 PET 图像.
    ReadPet,
    /// 读取 mask.
    ReadMask,
    /// 校正计算.
    Correct,
    /// 写出结果.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "Invalid parameters",
            Self::ReadPet => "Cannot read PET input file",
            Self::ReadMask => "Cannot read mask input file",
            Self::Correct => "Correction failed",
            Self::Write => "Cannot write output file",
        };
        f.write_str(s)
    }
}

/// 带阶段信息的失败.
#[derive(Debug)]
pub struct Failure {
    /// 失败阶段.
    pub stage: Stage,
    /// 出错阶段涉及的文件.
    pub path: Option<PathBuf>,
    /// 底层错误.
    pub error: PvcError,
}

impl Failure {
    /// 创建不涉及具体文件的失败.
    #[inline]
    pub fn new(stage: Stage, error: PvcError) -> Self {
        Self {
            stage,
            path: None,
            error,
        }
    }

    /// 记录出错阶段涉及的文件.
    #[inline]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 进程退出码. 见 [`exit_code`].
    #[inline]
    pub fn exit_code(&self) -> u8 {
        exit_code(&self.error)
    }

    /// 在标准错误上打印失败信息, 返回相应的退出码.
    pub fn report(&self) -> ExitCode {
        eprintln!("[Error]\t{self}");
        ExitCode::from(self.exit_code())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}: {}: {}", self.stage, p.display(), self.error),
            None => write!(f, "{}: {}", self.stage, self.error),
        }
    }
}

/// 将某一阶段的错误包装为 [`Failure`].
pub trait AtStage<T> {
    /// 标记失败阶段.
    fn at(self, stage: Stage) -> Result<T, Failure>;

    /// 标记失败阶段及其涉及的文件.
    fn at_file(self, stage: Stage, path: &Path) -> Result<T, Failure>;
}

impl<T> AtStage<T> for PvcResult<T> {
    #[inline]
    fn at(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|e| Failure::new(stage, e))
    }

    #[inline]
    fn at_file(self, stage: Stage, path: &Path) -> Result<T, Failure> {
        self.map_err(|e| Failure::new(stage, e).with_path(path))
    }
}

/// 错误对应的进程退出码:
///
/// | 错误 | 退出码 |
/// |---|---|
/// | `Io`, `NotVolume` | 2 |
/// | `InvalidMask` | 3 |
/// | `DivisionByZero` | 4 |
/// | `SingularMatrix`, `Linalg` | 5 |
/// | `Config` | 6 |
/// | 其他 | 1 |
pub fn exit_code(e: &PvcError) -> u8 {
    match e {
        PvcError::Io { .. } | PvcError::NotVolume { .. } => 2,
        PvcError::InvalidMask(_) => 3,
        PvcError::DivisionByZero { .. } => 4,
        PvcError::SingularMatrix { .. } | PvcError::Linalg(_) => 5,
        PvcError::Config(_) => 6,
        _ => 1,
    }
}

/// 一次校正运行的全部输入.
#[derive(Debug)]
pub struct Inputs {
    /// PET 图像.
    pub pet: Volume,
    /// 区域 mask.
    pub masks: RegionMaskSet,
    /// PSF.
    pub psf: Psf,
    /// 数值参数.
    pub config: PvcConfig,
}

/// 读取参数, PET 和 mask, 并检查 mask 与 PET 对齐.
pub fn load_inputs(args: &PvcArgs) -> Result<Inputs, Failure> {
    let config = loader::config_from_env().at(Stage::Config)?;
    let psf = args.psf().at(Stage::Config)?;

    info!("Reading PET image {}", args.pet.display());
    let pet = Volume::open(&args.pet).at_file(Stage::ReadPet, &args.pet)?;

    info!("Reading mask {}", args.mask.display());
    let masks = RegionMaskSet::open(&args.mask).at_file(Stage::ReadMask, &args.mask)?;
    masks
        .check_aligned(pet.grid())
        .at_file(Stage::ReadMask, &args.mask)?;
    info!(
        "{} regions on a {:?} grid, PSF FWHM (z, y, x) = {:?} mm",
        masks.len(),
        pet.shape(),
        psf.fwhm_mm()
    );

    Ok(Inputs {
        pet,
        masks,
        psf,
        config,
    })
}
