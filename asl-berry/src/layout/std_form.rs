use std::ops::Index;

use ndarray::{Array2, Axis};

use crate::error::{AslResult, ShapeError};

/// 标准形式的 ASL 数据集: 每个 TI 一个 (掩膜体素) × (测量) 矩阵.
///
/// `paired` 为 `true` 时, 每个矩阵的列按 (tag, control) 交替排列.
/// 所有矩阵的行数相同.
#[derive(Debug, Clone, PartialEq)]
pub struct StdForm {
    tis: Vec<Array2<f64>>,
    paired: bool,
}

impl Index<usize> for StdForm {
    type Output = Array2<f64>;

    #[inline]
    fn index(&self, ti: usize) -> &Self::Output {
        &self.tis[ti]
    }
}

impl StdForm {
    /// 由逐 TI 矩阵直接创建标准形式.
    ///
    /// 当列表为空, 各矩阵行数不一致, 或 `paired` 为 `true` 而某个矩阵列数为奇数时返回 `Err`.
    pub fn new(tis: Vec<Array2<f64>>, paired: bool) -> AslResult<Self> {
        let n_vox = tis.first().ok_or(ShapeError::Empty)?.nrows();
        for (ti, m) in tis.iter().enumerate() {
            if m.nrows() != n_vox {
                return Err(ShapeError::VoxelCountMismatch(ti, m.nrows(), n_vox).into());
            }
            if paired && m.ncols() % 2 != 0 {
                return Err(ShapeError::OddPairs(ti, m.ncols()).into());
            }
        }
        Ok(Self { tis, paired })
    }

    /// 内部构造, 调用者保证一致性.
    #[inline]
    pub(crate) fn from_parts(tis: Vec<Array2<f64>>, paired: bool) -> Self {
        debug_assert!(!tis.is_empty());
        Self { tis, paired }
    }

    /// TI 个数.
    #[inline]
    pub fn n_tis(&self) -> usize {
        self.tis.len()
    }

    /// 掩膜体素个数 (每个矩阵的行数).
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.tis[0].nrows()
    }

    /// 每个 TI 的列数.
    pub fn n_measurements(&self) -> Vec<usize> {
        self.tis.iter().map(|m| m.ncols()).collect()
    }

    /// 每个 TI 的重复次数. 配对数据中一个 (tag, control) 对计为一次.
    pub fn n_repeats(&self) -> Vec<usize> {
        let f = self.pair_factor();
        self.tis.iter().map(|m| m.ncols() / f).collect()
    }

    /// 是否为 tag / control 配对数据.
    #[inline]
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// 配对数据为 2, 否则为 1.
    #[inline]
    pub(crate) fn pair_factor(&self) -> usize {
        if self.paired {
            2
        } else {
            1
        }
    }

    /// 按 TI 顺序迭代矩阵.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Array2<f64>> {
        self.tis.iter()
    }

    /// 以切片形式获取所有矩阵.
    #[inline]
    pub fn as_slice(&self) -> &[Array2<f64>] {
        &self.tis
    }

    /// 消费自我, 获得底层矩阵列表.
    #[inline]
    pub fn into_inner(self) -> Vec<Array2<f64>> {
        self.tis
    }

    /// 还原为原始采集矩阵.
    ///
    /// `out_blocked` 和 `out_paired` 描述输出布局. 与 [`crate::Layout::to_std_form`]
    /// 使用相同标志时, 两者互为逆运算.
    ///
    /// # 错误
    ///
    /// 1. 交错输出要求各 TI 测量数一致;
    /// 2. 配对输出要求各 TI 测量数为偶数.
    pub fn to_raw(&self, out_blocked: bool, out_paired: bool) -> AslResult<Array2<f64>> {
        let raw = super::assemble(&self.tis, out_blocked, out_paired)?;
        log::debug!(
            "{} TIs -> raw {:?} (blocked: {out_blocked}, paired: {out_paired})",
            self.n_tis(),
            raw.dim()
        );
        Ok(raw)
    }

    /// 每个 TI 所有测量的均值组成的 (体素 × TI) 矩阵.
    ///
    /// 仅用于非配对数据 (通常是差分后的数据); 配对数据返回 `Err`,
    /// 应先调用 [`crate::pairs::separate_pairs`] 或自行差分.
    pub fn ti_means_matrix(&self) -> AslResult<Array2<f64>> {
        if self.paired {
            return Err(ShapeError::Paired.into());
        }
        let mut out = Array2::zeros((self.n_voxels(), self.n_tis()));
        for (mut col, m) in out.axis_iter_mut(Axis(1)).zip(self.tis.iter()) {
            if let Some(mean) = m.mean_axis(Axis(1)) {
                col.assign(&mean);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_checks() {
        assert!(StdForm::new(vec![], false).is_err());
        let a = Array2::<f64>::zeros((3, 4));
        let b = Array2::<f64>::zeros((2, 4));
        assert!(StdForm::new(vec![a.clone(), b], false).is_err());
        let c = Array2::<f64>::zeros((3, 3));
        assert!(StdForm::new(vec![a.clone(), c.clone()], true).is_err());
        // 分块数据允许各 TI 重复次数不同.
        let std = StdForm::new(vec![a, c], false).unwrap();
        assert_eq!(std.n_measurements(), vec![4, 3]);
        assert_eq!(std.to_raw(true, false).unwrap().dim(), (3, 7));
        assert!(std.to_raw(false, false).is_err());
    }

    #[test]
    fn test_ti_means_matrix() {
        let std = StdForm::new(
            vec![array![[1.0, 3.0], [2.0, 4.0]], array![[5.0, 5.0, 8.0], [0.0, 0.0, 3.0]]],
            false,
        )
        .unwrap();
        assert_eq!(std.n_repeats(), vec![2, 3]);
        assert_eq!(std.ti_means_matrix().unwrap(), array![[2.0, 6.0], [3.0, 1.0]]);
    }
}
