//! 时间约简: 逐 TI 均值与 epoch 划分.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::AslResult;
use crate::pairs::{merge_pairs, separate_pairs};
use crate::StdForm;

mod epoch;

pub use epoch::{epoch_means, gen_epochs, gen_ti_epochs, ti_epochs, EpochSpec, EpochUnit};

/// 对矩阵按列求均值, 结果为单列矩阵. 零列矩阵的结果为 NaN.
fn column_mean(m: ArrayView2<f64>) -> Array2<f64> {
    let mean = m
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::from_elem(m.nrows(), f64::NAN));
    mean.insert_axis(Axis(1))
}

/// 对每个 TI 的所有测量求均值.
///
/// 非配对数据的每个 TI 得到 1 列; 配对数据会分别对 tag 列和 control 列求均值,
/// 每个 TI 得到 2 列 (均值 tag, 均值 control), 结果仍标记为配对.
pub fn time_means(std: &StdForm) -> AslResult<StdForm> {
    if std.is_paired() {
        let (tag, ctrl) = separate_pairs(std)?;
        return merge_pairs(&mean_each(&tag), &mean_each(&ctrl));
    }
    Ok(mean_each(std))
}

fn mean_each(std: &StdForm) -> StdForm {
    let tis = std.iter().map(|m| column_mean(m.view())).collect();
    StdForm::from_parts(tis, std.is_paired())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Layout;
    use ndarray::array;

    #[test]
    fn test_time_means_paired_scenario() {
        // 2 TIs, 3 repeats, 配对, 分块.
        let raw = Array2::from_shape_fn((2, 12), |(r, c)| (r * 100 + c) as f64);
        let std = Layout::new(2, true, true)
            .unwrap()
            .to_std_form(raw.view())
            .unwrap();
        let means = time_means(&std).unwrap();
        assert!(means.is_paired());
        assert_eq!(means.n_tis(), 2);
        // TI0: tag 列 0, 2, 4; control 列 1, 3, 5.
        assert_eq!(means[0], array![[2.0, 3.0], [102.0, 103.0]]);
        // TI1: tag 列 6, 8, 10; control 列 7, 9, 11.
        assert_eq!(means[1], array![[8.0, 9.0], [108.0, 109.0]]);
    }

    #[test]
    fn test_time_means_single() {
        let std = StdForm::new(vec![array![[1.0, 2.0, 6.0]], array![[4.0, 0.0, 2.0]]], false)
            .unwrap();
        let means = time_means(&std).unwrap();
        assert!(!means.is_paired());
        assert_eq!(means[0], array![[3.0]]);
        assert_eq!(means[1], array![[2.0]]);
    }
}
