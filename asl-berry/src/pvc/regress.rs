//! 单个体素邻域上的最小二乘回归.

use nalgebra::DMatrix;
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::consts::{PVC_UNKNOWNS, SVD_MAX_SWEEPS};

/// 单个体素的回退原因.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackReason {
    /// 信号有限的掩膜内邻居个数少于未知量个数. 参数为这类邻居的个数.
    TooFewNeighbours(usize),

    /// 设计矩阵近奇异. 参数为 `σ_min / σ_max`.
    IllConditioned(f64),

    /// 回归结果出现非有限值.
    NonFinite,
}

/// 单个体素的回归结果.
#[derive(Debug, Clone, PartialEq)]
pub enum VoxelFit {
    /// 回归成功. 两个向量的长度均为时间点个数.
    Fitted {
        /// 灰质信号.
        gm: Array1<f64>,
        /// 白质信号.
        wm: Array1<f64>,
    },

    /// 回归不可行, 该体素保留原值.
    Fallback(FallbackReason),
}

impl VoxelFit {
    /// 是否回退.
    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// 在 `rows` 给出的邻居上求解 `Y ≈ X · β`, `X = [gm, wm]`.
///
/// `gm` 与 `wm` 是按掩膜展平后的部分容积比例, `data` 为 (体素 × 时间点).
/// 信号含非有限值的邻居不参与回归.
pub(super) fn fit_rows(
    data: ArrayView2<f64>,
    gm: ArrayView1<f64>,
    wm: ArrayView1<f64>,
    rows: &[usize],
    rcond: f64,
) -> VoxelFit {
    let rows: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&r| data.row(r).iter().all(|v| v.is_finite()))
        .collect();
    let n = rows.len();
    if n < PVC_UNKNOWNS {
        return VoxelFit::Fallback(FallbackReason::TooFewNeighbours(n));
    }

    let x = DMatrix::from_fn(n, PVC_UNKNOWNS, |i, j| match j {
        0 => gm[rows[i]],
        _ => wm[rows[i]],
    });
    let svd = match x.try_svd(true, true, f64::EPSILON, SVD_MAX_SWEEPS * n) {
        Some(svd) => svd,
        None => return VoxelFit::Fallback(FallbackReason::IllConditioned(0.0)),
    };
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    let ratio = if s_max > 0.0 { s_min / s_max } else { 0.0 };
    // rcond 为 0 时仍需排除数值秩不足的设计矩阵.
    let floor = (rcond * s_max).max(s_max * n as f64 * f64::EPSILON);
    if s_max <= 0.0 || s_min <= floor {
        return VoxelFit::Fallback(FallbackReason::IllConditioned(ratio));
    }
    let pinv = match svd.pseudo_inverse(0.0) {
        Ok(p) => p,
        Err(_) => return VoxelFit::Fallback(FallbackReason::IllConditioned(ratio)),
    };

    let t = data.ncols();
    let y = DMatrix::from_fn(n, t, |i, j| data[(rows[i], j)]);
    let beta = pinv * y;
    if beta.iter().any(|v| !v.is_finite()) {
        return VoxelFit::Fallback(FallbackReason::NonFinite);
    }
    VoxelFit::Fitted {
        gm: Array1::from_iter(beta.row(0).iter().copied()),
        wm: Array1::from_iter(beta.row(1).iter().copied()),
    }
}
