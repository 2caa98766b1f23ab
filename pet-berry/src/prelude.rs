//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Axes3, Idx3d};

pub use crate::config::PvcConfig;
pub use crate::data::{Grid, Psf, RegionMaskSet, Volume};
pub use crate::{MaskDefect, PvcError, PvcResult, ZeroStage};

pub use crate::consts::{DEFAULT_ITERATIONS, FWHM_TO_SIGMA};

pub use crate::filter::GaussianBlur;
pub use crate::gtm::{gtm_pvc, GtmSolution, TransferMatrix};
pub use crate::rbv::{rbv, rbv_correct, RbvOutcome};
pub use crate::stats::{observed_means, region_sizes, regional_means};
pub use crate::synth::{synthesize, synthetic_volume};
pub use crate::yang::{IterativeYang, YangOutcome};
