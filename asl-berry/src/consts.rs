//! 通用常量.

/// SVD 反卷积中常用的相对截断阈值.
///
/// 小于 `DEFAULT_SVD_TRUNCATION * 最大奇异值` 的奇异值会被丢弃.
/// 该值不会被隐式使用, 调用者需要通过 [`crate::deconv::SvdSpec::new`] 显式传入.
pub const DEFAULT_SVD_TRUNCATION: f64 = 0.2;

/// SVD 的迭代上限为 `SVD_MAX_SWEEPS * 矩阵阶数`. 超过上限视为不收敛.
pub const SVD_MAX_SWEEPS: usize = 100;

/// 部分容积回归中设计矩阵的默认相对条件阈值.
///
/// 当 `最小奇异值 / 最大奇异值` 小于该值时, 认为设计矩阵近奇异, 该体素退回原值.
pub const DEFAULT_PVC_RCOND: f64 = 1e-6;

/// 部分容积回归中的未知量个数 (灰质, 白质).
pub const PVC_UNKNOWNS: usize = 2;

/// 部分容积比例允许的越界容差.
pub const PV_FRACTION_TOLERANCE: f64 = 1e-6;

/// 写出文件时, TI 和 epoch 编号的十进制位数.
pub const INDEX_WIDTH: usize = 3;
