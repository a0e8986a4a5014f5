//! 缺失值填补: NaN 校正与掩膜内外推.

use itertools::iproduct;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::data::{Kernel, Mask};
use crate::error::AslResult;
use crate::Idx3d;

/// 以 `center` 为中心, 与之切比雪夫距离恰为 `r` 的所有网格内体素.
fn shell(center: Idx3d, r: usize, grid: Idx3d) -> impl Iterator<Item = Idx3d> {
    let span = |c: usize, len: usize| c.saturating_sub(r)..c.saturating_add(r).saturating_add(1).min(len);
    let (cz, ch, cw) = center;
    iproduct!(span(cz, grid.0), span(ch, grid.1), span(cw, grid.2))
        .filter(move |&(z, h, w)| z.abs_diff(cz).max(h.abs_diff(ch)).max(w.abs_diff(cw)) == r)
}

/// 距离 `center` 最近的一层有限值的均值. 整个体积没有有限值时返回 0.
fn nearest_finite_mean<T: num::Float>(vol: ArrayView3<T>, center: Idx3d) -> T {
    let (z, h, w) = vol.dim();
    let max_r = z.max(h).max(w);
    for r in 1..max_r {
        let (sum, count) = shell(center, r, vol.dim())
            .map(|pos| vol[pos])
            .filter(|v| v.is_finite())
            .fold((T::zero(), 0usize), |(s, c), v| (s + v, c + 1));
        if count > 0 {
            return sum / T::from(count).unwrap_or_else(T::one);
        }
    }
    T::zero()
}

/// 将体积中的每个非有限值替换为与之最近 (切比雪夫距离) 的一层有限值的均值.
///
/// 只读取输入体积, 因此已填补的值不会参与其它体素的填补.
pub fn correct_nan<T>(vol: ArrayView3<T>) -> Array3<T>
where
    T: num::Float + Send + Sync,
{
    let invalid: Vec<Idx3d> = vol
        .indexed_iter()
        .filter(|(_, v)| !v.is_finite())
        .map(|(pos, _)| pos)
        .collect();
    let fills = crate::par::map_indices(invalid.len(), |i| nearest_finite_mean(vol, invalid[i]));

    let mut ans = vol.to_owned();
    for (&pos, v) in invalid.iter().zip(fills) {
        ans[pos] = v;
    }
    log::debug!("replaced {} non-finite voxels", invalid.len());
    ans
}

/// 无效值: 非有限值或恰好为 0 (上游工具以 0 表示缺失).
#[inline]
fn is_invalid(v: f64) -> bool {
    !v.is_finite() || v == 0.0
}

/// 在掩膜内外推: 对 `data` (掩膜体素 × 时间点) 中的每个无效值,
/// 用核 `kernel` 覆盖的掩膜内邻居在同一时间点的有效值的均值填补.
///
/// 没有任何有效邻居的值置 0. 这不是错误, 只在 `debug` 日志中计数.
pub fn extrapolate(data: ArrayView2<f64>, mask: &Mask, kernel: &Kernel) -> AslResult<Array2<f64>> {
    mask.check_rows(data.nrows())?;

    let rows = crate::par::map_indices(mask.len(), |r| -> (Array1<f64>, usize) {
        let mut row = data.row(r).to_owned();
        if !row.iter().any(|v| is_invalid(*v)) {
            return (row, 0);
        }
        let neighbours = mask.neighbour_rows(mask.positions()[r], kernel);
        let mut unfilled = 0;
        for (t, v) in row.iter_mut().enumerate() {
            if !is_invalid(*v) {
                continue;
            }
            let (sum, count) = neighbours
                .iter()
                .map(|&n| data[(n, t)])
                .filter(|x| !is_invalid(*x))
                .fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
            *v = if count > 0 {
                sum / count as f64
            } else {
                unfilled += 1;
                0.0
            };
        }
        (row, unfilled)
    });

    let mut ans = Array2::zeros(data.dim());
    let mut unfilled = 0;
    for (mut dst, (row, n)) in ans.axis_iter_mut(Axis(0)).zip(rows) {
        dst.assign(&row);
        unfilled += n;
    }
    if unfilled > 0 {
        log::debug!("{unfilled} entries have no valid neighbour and are left at 0");
    }
    Ok(ans)
}
