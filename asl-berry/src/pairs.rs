//! tag / control 配对的拆分与合并.

use ndarray::{s, Array2, Axis};

use crate::error::{AslResult, ShapeError};
use crate::StdForm;

/// 将标准形式数据中每个 TI 的奇数列 (从 1 开始计数, 即下标 0, 2, 4, ..., tag)
/// 与偶数列 (下标 1, 3, 5, ..., control) 拆分为两份非配对的标准形式数据.
///
/// 输入本身是否被标记为配对并不重要, 只要求每个 TI 的列数为偶数, 否则返回 `Err`.
pub fn separate_pairs(std: &StdForm) -> AslResult<(StdForm, StdForm)> {
    if let Some((ti, m)) = std.iter().enumerate().find(|(_, m)| m.ncols() % 2 != 0) {
        return Err(ShapeError::OddPairs(ti, m.ncols()).into());
    }
    let (odd, even): (Vec<_>, Vec<_>) = std
        .iter()
        .map(|m| (m.slice(s![.., 0..;2]).to_owned(), m.slice(s![.., 1..;2]).to_owned()))
        .unzip();
    Ok((StdForm::from_parts(odd, false), StdForm::from_parts(even, false)))
}

/// [`separate_pairs`] 的逆操作: 将 `odd` 和 `even` 逐列交错合并, 结果标记为配对.
///
/// 两者 TI 个数或任一 TI 的矩阵形状不一致时返回 `Err`.
pub fn merge_pairs(odd: &StdForm, even: &StdForm) -> AslResult<StdForm> {
    if odd.n_tis() != even.n_tis() {
        return Err(ShapeError::TiCountMismatch(odd.n_tis(), even.n_tis()).into());
    }
    let mut tis = Vec::with_capacity(odd.n_tis());
    for (ti, (o, e)) in odd.iter().zip(even.iter()).enumerate() {
        if o.dim() != e.dim() {
            return Err(ShapeError::TiShapeMismatch(ti, o.dim(), e.dim()).into());
        }
        let (n_vox, n) = o.dim();
        let mut merged = Array2::zeros((n_vox, 2 * n));
        for (i, (oc, ec)) in o.axis_iter(Axis(1)).zip(e.axis_iter(Axis(1))).enumerate() {
            merged.column_mut(2 * i).assign(&oc);
            merged.column_mut(2 * i + 1).assign(&ec);
        }
        tis.push(merged);
    }
    Ok(StdForm::from_parts(tis, true))
}
