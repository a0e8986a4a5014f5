//! 格式转换: 原始采集矩阵 ⇄ 标准形式 (逐 TI 矩阵列表).
//!
//! # 列顺序约定
//!
//! 设 TI 个数为 `n`, 每个 TI 的测量数为 `m` (配对时包含 tag 和 control 两列).
//!
//! 1. 分块 (blocked): 列 `[k * m, (k + 1) * m)` 属于第 `k` 个 TI.
//! 2. 交错, 非配对: 第 `c` 列属于第 `c % n` 个 TI.
//! 3. 交错, 配对: 交错的单位是 (tag, control) 对. 第 `c` 列属于第 `(c / 2) % n` 个 TI,
//!   同一对的两列在结果中依然相邻.
//!
//! 转换是纯粹的列置换, 不修改任何数值, 因此 `raw -> std -> raw` 逐位相同.

use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::error::{AslResult, ConfigError, ShapeError};

mod std_form;

pub use std_form::StdForm;

/// 数据集布局. 创建一次, 之后在整个处理流程中以引用传递.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    n_tis: usize,
    blocked: bool,
    paired: bool,
}

impl Layout {
    /// 创建布局描述. `n_tis` 为 0 时返回 `Err`.
    ///
    /// `blocked` 表示同一 TI 的所有重复在原始数据中连续存放;
    /// `paired` 表示 tag / control 交替出现.
    pub fn new(n_tis: usize, blocked: bool, paired: bool) -> AslResult<Self> {
        if n_tis == 0 {
            return Err(ConfigError::ZeroTis.into());
        }
        Ok(Self {
            n_tis,
            blocked,
            paired,
        })
    }

    /// TI 个数.
    #[inline]
    pub fn n_tis(&self) -> usize {
        self.n_tis
    }

    /// 是否为分块布局.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// 是否为 tag / control 配对数据.
    #[inline]
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// 原始数据第 `col` 列在标准形式中的位置 `(TI 索引, TI 内列索引)`.
    /// `n_meas` 为每个 TI 的测量数.
    #[inline]
    fn locate(&self, col: usize, n_meas: usize) -> (usize, usize) {
        locate(self.n_tis, self.blocked, self.paired, col, n_meas)
    }

    /// 将原始采集矩阵 (体素 × 采集) 转换为标准形式.
    ///
    /// 当列数不能被 TI 个数整除, 或配对数据的每 TI 测量数为奇数时返回 `Err`.
    pub fn to_std_form(&self, raw: ArrayView2<f64>) -> AslResult<StdForm> {
        let (n_vox, n_cols) = raw.dim();
        if n_cols % self.n_tis != 0 {
            return Err(ShapeError::IndivisibleTis(n_cols, self.n_tis).into());
        }
        let n_meas = n_cols / self.n_tis;
        if self.paired && n_meas % 2 != 0 {
            return Err(ShapeError::OddPairs(0, n_meas).into());
        }

        let mut tis = vec![Array2::zeros((n_vox, n_meas)); self.n_tis];
        for (col, src) in raw.axis_iter(Axis(1)).enumerate() {
            let (ti, dst) = self.locate(col, n_meas);
            tis[ti].column_mut(dst).assign(&src);
        }
        log::debug!(
            "raw ({n_vox} x {n_cols}) -> {} TIs x {n_meas} measurements (blocked: {}, paired: {})",
            self.n_tis,
            self.blocked,
            self.paired
        );
        Ok(StdForm::from_parts(tis, self.paired))
    }

    /// 以本布局的标志将标准形式还原为原始采集矩阵. 见 [`StdForm::to_raw`].
    #[inline]
    pub fn from_std_form(&self, std: &StdForm) -> AslResult<Array2<f64>> {
        std.to_raw(self.blocked, self.paired)
    }
}

/// 见 [`Layout::locate`].
fn locate(n_tis: usize, blocked: bool, paired: bool, col: usize, n_meas: usize) -> (usize, usize) {
    match (blocked, paired) {
        (true, _) => (col / n_meas, col % n_meas),
        (false, false) => (col % n_tis, col / n_tis),
        (false, true) => {
            let (pair, side) = (col / 2, col % 2);
            (pair % n_tis, (pair / n_tis) * 2 + side)
        }
    }
}

/// 将标准形式组装为原始矩阵. 调用者保证分块以外的情况下各 TI 测量数一致.
pub(crate) fn assemble(
    tis: &[Array2<f64>],
    blocked: bool,
    paired: bool,
) -> AslResult<Array2<f64>> {
    let first = tis.first().ok_or(ShapeError::Empty)?;
    let n_vox = first.nrows();
    if let Some((ti, m)) = tis.iter().enumerate().find(|(_, m)| m.nrows() != n_vox) {
        return Err(ShapeError::VoxelCountMismatch(ti, m.nrows(), n_vox).into());
    }
    if paired {
        if let Some((ti, m)) = tis.iter().enumerate().find(|(_, m)| m.ncols() % 2 != 0) {
            return Err(ShapeError::OddPairs(ti, m.ncols()).into());
        }
    }

    if blocked {
        let views: Vec<_> = tis.iter().map(|m| m.view()).collect();
        // 行数已检查, 不会失败.
        return concatenate(Axis(1), &views)
            .map_err(|_| ShapeError::VoxelCountMismatch(0, n_vox, n_vox).into());
    }

    let n_meas = first.ncols();
    if let Some((ti, m)) = tis.iter().enumerate().find(|(_, m)| m.ncols() != n_meas) {
        return Err(ShapeError::RaggedRepeats(ti, m.ncols(), n_meas).into());
    }
    let n_tis = tis.len();
    let mut raw = Array2::zeros((n_vox, n_meas * n_tis));
    for (col, mut dst) in raw.axis_iter_mut(Axis(1)).enumerate() {
        let (ti, src) = locate(n_tis, false, paired, col, n_meas);
        dst.assign(&tis[ti].column(src));
    }
    Ok(raw)
}
