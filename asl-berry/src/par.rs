//! 逐体素映射. 开启 `rayon` feature 时并行执行, 否则顺序执行.
//!
//! 每个体素的计算只读取自己的邻域并只写自己的输出, 因此两种方式结果一致.

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        /// 对 `0..n` 中每个索引计算 `op`, 按索引顺序收集结果.
        pub(crate) fn map_indices<T, F>(n: usize, op: F) -> Vec<T>
        where
            T: Send,
            F: Fn(usize) -> T + Sync + Send,
        {
            (0..n).into_par_iter().map(op).collect()
        }
    } else {
        /// 对 `0..n` 中每个索引计算 `op`, 按索引顺序收集结果.
        pub(crate) fn map_indices<T, F>(n: usize, op: F) -> Vec<T>
        where
            T: Send,
            F: Fn(usize) -> T + Sync + Send,
        {
            (0..n).map(op).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::map_indices;

    #[test]
    fn test_order_preserved() {
        let v = map_indices(1000, |i| i * 2);
        assert!(v.iter().enumerate().all(|(i, x)| *x == 2 * i));
    }
}
