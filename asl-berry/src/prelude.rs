//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{Kernel, KernelShape, Mask};
pub use crate::error::{AslError, AslResult, ConfigError, NumericalError, ShapeError};
pub use crate::layout::{Layout, StdForm};

pub use crate::consts::{DEFAULT_PVC_RCOND, DEFAULT_SVD_TRUNCATION};

pub use crate::deconv::{deconvolve_std_form, svd_deconvolve, Aif, SvdSpec};
pub use crate::fill::{correct_nan, extrapolate};
pub use crate::pairs::{merge_pairs, separate_pairs};
pub use crate::pvc::{correct_pv, separate_tissues, Compartment, PvcSpec, TissueSignals, VoxelFit};
pub use crate::reduce::{
    epoch_means, gen_epochs, gen_ti_epochs, ti_epochs, time_means, EpochSpec, EpochUnit,
};
