//! 部分容积 (PV) 校正.
//!
//! 每个掩膜内体素的信号被建模为灰质与白质信号按各自部分容积比例的线性组合.
//! 假设两种组织的信号在核覆盖的小邻域内是常数, 则对邻域内所有体素做最小二乘回归
//! `Y ≈ [gm, wm] · β` 即可得到中心体素的纯组织信号.
//!
//! 信号含非有限值的邻居不参与回归, 因此单个 NaN 体素只影响它自己.
//! 回归不可行的体素 (有效邻居过少, 设计矩阵近奇异) 不会导致整个操作失败,
//! 而是保留原值并记录在 [`TissueSignals::fallbacks`] 中. 原值中的非有限项由
//! [`crate::fill::extrapolate`] 填补.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::consts::{DEFAULT_PVC_RCOND, PV_FRACTION_TOLERANCE};
use crate::data::{Kernel, Mask};
use crate::error::{AslResult, ConfigError};

mod regress;

pub use regress::{FallbackReason, VoxelFit};

/// 校正输出的组织成分.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compartment {
    /// 灰质.
    #[default]
    Gm,

    /// 白质.
    Wm,
}

/// PV 校正参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PvcSpec {
    kernel: Kernel,
    compartment: Compartment,
    rcond: f64,
}

impl PvcSpec {
    /// 以邻域核 `kernel` 创建参数. 默认输出灰质, 条件阈值为 [`DEFAULT_PVC_RCOND`].
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            compartment: Compartment::default(),
            rcond: DEFAULT_PVC_RCOND,
        }
    }

    /// 设置 [`correct_pv`] 输出的组织成分.
    pub fn with_compartment(mut self, compartment: Compartment) -> Self {
        self.compartment = compartment;
        self
    }

    /// 设置条件阈值. `rcond` 必须在 `[0, 1)` 内.
    pub fn with_rcond(mut self, rcond: f64) -> AslResult<Self> {
        if !(0.0..1.0).contains(&rcond) {
            return Err(ConfigError::Rcond(rcond).into());
        }
        self.rcond = rcond;
        Ok(self)
    }

    /// 邻域核.
    #[inline]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// 输出的组织成分.
    #[inline]
    pub fn compartment(&self) -> Compartment {
        self.compartment
    }

    /// 设计矩阵的相对条件阈值.
    #[inline]
    pub fn rcond(&self) -> f64 {
        self.rcond
    }
}

/// 两种组织的校正信号. 矩阵形状均与输入数据相同.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueSignals {
    /// 灰质信号.
    pub gm: Array2<f64>,

    /// 白质信号.
    pub wm: Array2<f64>,

    /// 回退为原值的体素 (矩阵行), 升序.
    pub fallbacks: Vec<usize>,
}

/// 检查部分容积比例图: 网格与掩膜一致, 掩膜内的值有限且在 `[0, 1]` 内.
fn check_pv_map(pv: ArrayView3<f64>, mask: &Mask) -> AslResult<()> {
    mask.check_grid(pv.dim())?;
    let range = -PV_FRACTION_TOLERANCE..=1.0 + PV_FRACTION_TOLERANCE;
    for &pos in mask.positions() {
        let v = pv[pos];
        if !range.contains(&v) {
            return Err(ConfigError::PvFraction(pos, v).into());
        }
    }
    Ok(())
}

/// 对每个掩膜内体素做邻域回归, 按矩阵行顺序返回结果.
///
/// `data` 为 (掩膜体素 × 时间点), `gm` 与 `wm` 是与掩膜同网格的部分容积比例图.
pub fn fit_voxels(
    data: ArrayView2<f64>,
    mask: &Mask,
    gm: ArrayView3<f64>,
    wm: ArrayView3<f64>,
    spec: &PvcSpec,
) -> AslResult<Vec<VoxelFit>> {
    mask.check_rows(data.nrows())?;
    check_pv_map(gm, mask)?;
    check_pv_map(wm, mask)?;

    let gm = mask.flatten_3d(gm)?;
    let wm = mask.flatten_3d(wm)?;
    let (gm, wm): (ArrayView1<f64>, ArrayView1<f64>) = (gm.column(0), wm.column(0));

    Ok(crate::par::map_indices(mask.len(), |row| {
        let rows = mask.neighbour_rows(mask.positions()[row], spec.kernel());
        regress::fit_rows(data, gm, wm, &rows, spec.rcond())
    }))
}

/// 分离两种组织的信号. 回退体素的两种信号均为原值, 其中的非有限项按同一个核外推填补.
pub fn separate_tissues(
    data: ArrayView2<f64>,
    mask: &Mask,
    gm: ArrayView3<f64>,
    wm: ArrayView3<f64>,
    spec: &PvcSpec,
) -> AslResult<TissueSignals> {
    let fits = fit_voxels(data, mask, gm, wm, spec)?;

    let mut ans = TissueSignals {
        gm: data.to_owned(),
        wm: data.to_owned(),
        fallbacks: Vec::new(),
    };
    let rows = ans
        .gm
        .axis_iter_mut(Axis(0))
        .zip(ans.wm.axis_iter_mut(Axis(0)))
        .zip(fits);
    for (row, ((mut g, mut w), fit)) in rows.enumerate() {
        match fit {
            VoxelFit::Fitted { gm, wm } => {
                g.assign(&gm);
                w.assign(&wm);
            }
            VoxelFit::Fallback(reason) => {
                log::debug!("voxel row {row} keeps its original signal: {reason:?}");
                ans.fallbacks.push(row);
            }
        }
    }
    let has_nan = |r: &usize| data.row(*r).iter().any(|v| !v.is_finite());
    if ans.fallbacks.iter().any(has_nan) {
        let filled = crate::fill::extrapolate(data, mask, spec.kernel())?;
        for &r in ans.fallbacks.iter().filter(|r| has_nan(*r)) {
            for (t, v) in data.row(r).indexed_iter() {
                if !v.is_finite() {
                    ans.gm[(r, t)] = filled[(r, t)];
                    ans.wm[(r, t)] = filled[(r, t)];
                }
            }
        }
    }
    if !ans.fallbacks.is_empty() {
        log::warn!(
            "partial volume correction fell back on {} of {} voxels",
            ans.fallbacks.len(),
            mask.len()
        );
    }
    Ok(ans)
}

/// PV 校正, 返回 `spec` 指定组织成分的信号 (形状与 `data` 相同).
pub fn correct_pv(
    data: ArrayView2<f64>,
    mask: &Mask,
    gm: ArrayView3<f64>,
    wm: ArrayView3<f64>,
    spec: &PvcSpec,
) -> AslResult<Array2<f64>> {
    let signals = separate_tissues(data, mask, gm, wm, spec)?;
    Ok(match spec.compartment() {
        Compartment::Gm => signals.gm,
        Compartment::Wm => signals.wm,
    })
}
