//! 基于动脉输入函数 (AIF) 的截断 SVD 反卷积.
//!
//! 模型为因果卷积 `data = C · x`, 其中 `C` 是由 AIF 构造的下三角 Toeplitz 矩阵,
//! `x` 是残余函数. 反卷积是病态问题, 因此必须丢弃较小的奇异值以限制噪声放大:
//! 小于 `truncation * σ_max` 的奇异值被视为 0.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::consts::SVD_MAX_SWEEPS;
use crate::error::{AslResult, ConfigError, NumericalError, ShapeError};
use crate::StdForm;

/// 动脉输入函数.
#[derive(Debug, Clone, Copy)]
pub enum Aif<'a> {
    /// 所有体素共享同一条 AIF, 长度为时间点数 `N`.
    Global(ArrayView1<'a, f64>),

    /// 每个体素一条 AIF. 形状与数据相同, 即 (时间点 × 体素).
    PerVoxel(ArrayView2<'a, f64>),
}

/// SVD 截断参数.
///
/// 截断阈值没有隐式默认值; 常用值见 [`crate::consts::DEFAULT_SVD_TRUNCATION`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SvdSpec {
    truncation: f64,
}

impl SvdSpec {
    /// 创建参数. `truncation` 是相对于最大奇异值的截断比例, 必须在 `[0, 1)` 内.
    pub fn new(truncation: f64) -> AslResult<Self> {
        if !(0.0..1.0).contains(&truncation) {
            return Err(ConfigError::Truncation(truncation).into());
        }
        Ok(Self { truncation })
    }

    /// 相对截断比例.
    #[inline]
    pub fn truncation(&self) -> f64 {
        self.truncation
    }
}

/// 构造卷积矩阵: `N × N` 下三角矩阵, 第 `j` 列是延迟 `j` 个采样点并补零的 AIF,
/// 即 `C[i, j] = aif[i - j]` (`i >= j`), 其余为 0.
pub fn conv_matrix(aif: ArrayView1<f64>) -> Array2<f64> {
    let n = aif.len();
    Array2::from_shape_fn((n, n), |(i, j)| if i >= j { aif[i - j] } else { 0.0 })
}

/// 截断 SVD 伪逆 `V Σ⁺ Uᵀ`. `voxel` 仅用于错误报告.
fn truncated_pinv(c: &Array2<f64>, spec: &SvdSpec, voxel: Option<usize>) -> AslResult<Array2<f64>> {
    if let Some(&v) = c.iter().find(|v| !v.is_finite()) {
        return Err(NumericalError::DegenerateAif(voxel, v).into());
    }

    let n = c.nrows();
    let svd = DMatrix::from_fn(n, n, |i, j| c[(i, j)])
        .try_svd(true, true, f64::EPSILON, SVD_MAX_SWEEPS * n.max(1))
        .ok_or(NumericalError::NotConverged(voxel))?;
    let s_max = svd.singular_values.max();
    // 低于该值时 1 / σ 会溢出.
    if !(s_max.is_finite() && s_max > f64::MIN_POSITIVE / f64::EPSILON) {
        return Err(NumericalError::DegenerateAif(voxel, s_max).into());
    }

    // 数值秩以下的奇异值无论截断比例如何都要丢弃.
    let eps = (spec.truncation * s_max).max(s_max * n as f64 * f64::EPSILON);
    let pinv = svd
        .pseudo_inverse(eps)
        .map_err(|_| NumericalError::DegenerateAif(voxel, s_max))?;
    if pinv.iter().any(|v| !v.is_finite()) {
        return Err(NumericalError::DegenerateAif(voxel, s_max).into());
    }
    Ok(Array2::from_shape_fn((n, n), |(i, j)| pinv[(i, j)]))
}

/// 对 `data` (时间点 × 体素) 的每一列求解 `data ≈ C · x`, 返回残余函数 (形状与 `data` 相同).
///
/// # 错误
///
/// 1. `data` 为空, 或 AIF 的长度/形状与 `data` 不一致时返回形状错误;
/// 2. AIF 含非有限值, SVD 不收敛, 或所有奇异值都接近 0 时返回数值错误.
///   逐体素 AIF 报告第一个出错的体素.
pub fn svd_deconvolve(data: ArrayView2<f64>, aif: &Aif, spec: &SvdSpec) -> AslResult<Array2<f64>> {
    let (n, n_vox) = data.dim();
    if n == 0 {
        return Err(ShapeError::Empty.into());
    }

    match aif {
        Aif::Global(a) => {
            if a.len() != n {
                return Err(ShapeError::AifMismatch((a.len(), 1), (n, n_vox)).into());
            }
            let pinv = truncated_pinv(&conv_matrix(a.view()), spec, None)?;
            log::debug!("deconvolving {n_vox} voxels with a shared AIF of length {n}");
            Ok(pinv.dot(&data))
        }
        Aif::PerVoxel(a) => {
            if a.dim() != data.dim() {
                return Err(ShapeError::AifMismatch(a.dim(), data.dim()).into());
            }
            let cols = crate::par::map_indices(n_vox, |v| -> AslResult<Array1<f64>> {
                let pinv = truncated_pinv(&conv_matrix(a.column(v)), spec, Some(v))?;
                Ok(pinv.dot(&data.column(v)))
            });
            let mut out = Array2::zeros((n, n_vox));
            for (mut dst, col) in out.axis_iter_mut(Axis(1)).zip(cols) {
                dst.assign(&col?);
            }
            Ok(out)
        }
    }
}

/// 对标准形式数据做反卷积: 先求每个 TI 的均值, 得到 (体素 × TI) 矩阵,
/// 以 TI 为时间轴逐体素反卷积, 返回 (体素 × TI) 的残余函数.
///
/// 这里 `Aif::PerVoxel` 与标准形式保持一致, 形状为 (体素 × TI).
/// 配对数据返回 `Err`, 应先差分.
pub fn deconvolve_std_form(std: &StdForm, aif: &Aif, spec: &SvdSpec) -> AslResult<Array2<f64>> {
    let means = std.ti_means_matrix()?;
    let aif = match aif {
        Aif::Global(a) => Aif::Global(a.view()),
        Aif::PerVoxel(a) => Aif::PerVoxel(a.t()),
    };
    Ok(svd_deconvolve(means.t(), &aif, spec)?.reversed_axes())
}
