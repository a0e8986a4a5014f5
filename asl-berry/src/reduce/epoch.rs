//! epoch 划分.
//!
//! epoch 是长度为 `epol` 的重复窗口, 每隔 `epadv` 个重复开始一个新窗口.
//! 当 `epadv < epol` 时窗口相互重叠.
//!
//! 以 TI 为单位时 ([`EpochUnit::Ti`]), 先对每个 TI 的重复求均值, 再沿 TI 方向划分窗口,
//! 此时 `epadv` 与 `epol` 以 TI 个数计.
//!
//! # 末尾不完整窗口
//!
//! 完整窗口能放下时依次产出完整窗口. 此后若仍有重复未被覆盖, 则 **额外产出一个**
//! 从下一个窗口起点到序列末尾的不完整窗口 (include-partial). `gen_epochs` 和
//! `gen_ti_epochs` 使用同一策略. 因此当 `epadv <= epol` 时所有列都至少被覆盖一次.

use std::ops::Range;

use ndarray::{s, Array2, ArrayView2, Axis};

use crate::error::{AslResult, ConfigError, ShapeError};
use crate::StdForm;

/// epoch 窗口的计数单位.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EpochUnit {
    /// 沿重复方向划分, 每个 epoch 包含所有 TI.
    #[default]
    Repeat,

    /// 对重复求均值后沿 TI 方向划分.
    Ti,
}

/// epoch 参数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpochSpec {
    /// 相邻 epoch 起点之间的重复数.
    epadv: usize,

    /// 每个 epoch 的长度 (重复数).
    epol: usize,
}

impl EpochSpec {
    /// 创建 epoch 参数. `epadv` 或 `epol` 为 0 时返回 `Err`.
    ///
    /// 允许 `epadv > epol` (窗口之间存在间隙), 但此时不再保证覆盖所有重复.
    pub fn new(epadv: usize, epol: usize) -> AslResult<Self> {
        if epadv == 0 || epol == 0 {
            return Err(ConfigError::EpochSize(epadv, epol).into());
        }
        if epadv > epol {
            log::warn!("epoch advance {epadv} exceeds epoch length {epol}, some repeats will be skipped");
        }
        Ok(Self { epadv, epol })
    }

    /// 相邻 epoch 起点之间的重复数.
    #[inline]
    pub fn advance(&self) -> usize {
        self.epadv
    }

    /// 每个 epoch 的长度.
    #[inline]
    pub fn length(&self) -> usize {
        self.epol
    }

    /// 对长度为 `n` 的序列划分窗口. 返回每个窗口覆盖的 (重复) 索引区间, 按起点升序.
    pub fn ranges(&self, n: usize) -> Vec<Range<usize>> {
        let mut ans = Vec::with_capacity(n / self.epadv + 1);
        let mut start = 0;
        while start + self.epol <= n {
            ans.push(start..start + self.epol);
            start += self.epadv;
        }
        let covered = ans.last().map_or(0, |r| r.end);
        if covered < n && start < n {
            log::warn!(
                "final epoch only partially covered: repeats {start}..{n} (length {})",
                self.epol
            );
            ans.push(start..n);
        }
        ans
    }
}

/// 对单个矩阵的列划分 epoch. 每个 epoch 是原矩阵连续列组成的新矩阵, 列顺序不变.
pub fn gen_ti_epochs(data: ArrayView2<f64>, spec: &EpochSpec) -> Vec<Array2<f64>> {
    spec.ranges(data.ncols())
        .into_iter()
        .map(|r| data.slice(s![.., r]).to_owned())
        .collect()
}

/// 对整个标准形式数据集划分 epoch. 每个 epoch 仍是一份标准形式数据,
/// 包含所有 TI 在同一重复窗口内的列.
///
/// 配对数据以 (tag, control) 对为单位计数, 因此窗口不会拆开一对.
/// 各 TI 的重复次数必须相同, 否则返回 `Err`.
pub fn gen_epochs(std: &StdForm, spec: &EpochSpec) -> AslResult<Vec<StdForm>> {
    let repeats = std.n_repeats();
    let n = repeats[0];
    if let Some((ti, &r)) = repeats.iter().enumerate().find(|(_, r)| **r != n) {
        return Err(ShapeError::RaggedRepeats(ti, r, n).into());
    }

    let f = std.pair_factor();
    let epochs: Vec<_> = spec
        .ranges(n)
        .into_iter()
        .map(|r| {
            let cols = r.start * f..r.end * f;
            let tis = std.iter().map(|m| m.slice(s![.., cols.clone()]).to_owned()).collect();
            StdForm::from_parts(tis, std.is_paired())
        })
        .collect();
    log::debug!("{n} repeats -> {} epochs", epochs.len());
    Ok(epochs)
}

/// 以 TI 为单位划分 epoch.
///
/// 先用 [`super::time_means`] 对每个 TI 的重复求均值, 按 TI 顺序拼成
/// (体素 × TI) 矩阵 (配对数据每个 TI 占 (均值 tag, 均值 control) 两列),
/// 再用 [`gen_ti_epochs`] 沿 TI 方向划分. 配对数据的窗口不会拆开同一个 TI 的两列.
pub fn ti_epochs(std: &StdForm, spec: &EpochSpec) -> AslResult<Vec<Array2<f64>>> {
    let means = super::time_means(std)?;
    let f = means.pair_factor();

    let mut flat = Array2::zeros((means.n_voxels(), means.n_tis() * f));
    for (mut dst, m) in flat.axis_chunks_iter_mut(Axis(1), f).zip(means.iter()) {
        dst.assign(m);
    }
    let scaled = EpochSpec {
        epadv: spec.epadv * f,
        epol: spec.epol * f,
    };
    let epochs = gen_ti_epochs(flat.view(), &scaled);
    log::debug!("{} TIs -> {} TI epochs", means.n_tis(), epochs.len());
    Ok(epochs)
}

/// 对每个 epoch 求逐 TI 均值 (见 [`super::time_means`]).
pub fn epoch_means(std: &StdForm, spec: &EpochSpec) -> AslResult<Vec<StdForm>> {
    gen_epochs(std, spec)?
        .iter()
        .map(super::time_means)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Layout;
    use ndarray::array;

    fn numbered(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * 1000 + c) as f64)
    }

    #[test]
    fn test_epoch_spec() {
        crate::init_test_logger();
        assert!(EpochSpec::new(0, 3).is_err());
        assert!(EpochSpec::new(2, 0).is_err());

        let spec = EpochSpec::new(2, 4).unwrap();
        assert_eq!(spec.ranges(10), vec![0..4, 2..6, 4..8, 6..10]);
        // 末尾剩余重复形成一个不完整窗口.
        assert_eq!(spec.ranges(11), vec![0..4, 2..6, 4..8, 6..10, 8..11]);
        // 长度不足一个窗口时, 整个序列即一个不完整窗口.
        assert_eq!(spec.ranges(3), vec![0..3]);
        assert!(spec.ranges(0).is_empty());

        let gapped = EpochSpec::new(5, 3).unwrap();
        assert_eq!(gapped.ranges(10), vec![0..3, 5..8]);
        assert_eq!(gapped.ranges(12), vec![0..3, 5..8, 10..12]);
    }

    #[test]
    fn test_epoch_coverage() {
        for n in 1..20 {
            for epol in 1..6 {
                for epadv in 1..=epol {
                    let spec = EpochSpec::new(epadv, epol).unwrap();
                    let mut covered = vec![false; n];
                    let mut last_start = None;
                    for r in spec.ranges(n) {
                        assert!(r.end <= n && r.start < r.end);
                        assert!(r.len() <= epol);
                        if let Some(s) = last_start {
                            assert!(r.start > s);
                        }
                        last_start = Some(r.start);
                        r.for_each(|i| covered[i] = true);
                    }
                    assert!(covered.iter().all(|c| *c), "n: {n}, epadv: {epadv}, epol: {epol}");
                }
            }
        }
    }

    #[test]
    fn test_gen_ti_epochs() {
        let m = numbered(2, 7);
        let spec = EpochSpec::new(3, 3).unwrap();
        let epochs = gen_ti_epochs(m.view(), &spec);
        assert_eq!(epochs.len(), 3);
        assert_eq!(epochs[0].row(0).to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(epochs[1].row(1).to_vec(), vec![1003.0, 1004.0, 1005.0]);
        assert_eq!(epochs[2].row(0).to_vec(), vec![6.0]);
    }

    #[test]
    fn test_gen_epochs_paired() {
        // 2 TIs, 3 repeats, 配对, 分块.
        let raw = numbered(1, 12);
        let std = Layout::new(2, true, true)
            .unwrap()
            .to_std_form(raw.view())
            .unwrap();
        let spec = EpochSpec::new(1, 2).unwrap();
        let epochs = gen_epochs(&std, &spec).unwrap();
        assert_eq!(epochs.len(), 2);
        assert!(epochs.iter().all(|e| e.is_paired() && e.n_tis() == 2));
        assert_eq!(epochs[0][0], array![[0.0, 1.0, 2.0, 3.0]]);
        assert_eq!(epochs[1][1], array![[8.0, 9.0, 10.0, 11.0]]);

        let means = epoch_means(&std, &spec).unwrap();
        assert_eq!(means[0][0], array![[1.0, 2.0]]);
        assert_eq!(means[1][1], array![[9.0, 10.0]]);
    }

    #[test]
    fn test_ti_epochs() {
        // 4 TIs, 每个 TI 2 个重复, 非配对. TI i 的均值为 10 * i + 0.5.
        let std = StdForm::new(
            (0..4)
                .map(|ti| array![[10.0 * ti as f64, 10.0 * ti as f64 + 1.0]])
                .collect(),
            false,
        )
        .unwrap();
        let spec = EpochSpec::new(2, 3).unwrap();
        let epochs = ti_epochs(&std, &spec).unwrap();
        assert_eq!(epochs, vec![array![[0.5, 10.5, 20.5]], array![[20.5, 30.5]]]);

        // 配对数据: 每个 TI 的 (均值 tag, 均值 control) 不会被拆开.
        let raw = numbered(1, 12);
        let paired = Layout::new(3, true, true)
            .unwrap()
            .to_std_form(raw.view())
            .unwrap();
        let epochs = ti_epochs(&paired, &EpochSpec::new(1, 2).unwrap()).unwrap();
        assert_eq!(
            epochs,
            vec![array![[1.0, 2.0, 5.0, 6.0]], array![[5.0, 6.0, 9.0, 10.0]]]
        );
    }

    #[test]
    fn test_gen_epochs_ragged() {
        let std = StdForm::new(vec![Array2::zeros((1, 3)), Array2::zeros((1, 4))], false).unwrap();
        assert!(gen_epochs(&std, &EpochSpec::new(1, 1).unwrap()).is_err());
    }
}
