//! 运行时错误.
//!
//! 形状错误和配置错误在操作开始时即被检测并返回, 不会被静默修正.
//! 逐体素的数值退化 (部分容积校正, 外推) 不属于错误, 见 [`crate::pvc::VoxelFit`].

use thiserror::Error;

/// 本 crate 所有可失败操作的返回类型.
pub type AslResult<T> = Result<T, AslError>;

/// 顶层错误.
#[derive(Error, Debug)]
pub enum AslError {
    /// 行数/列数与声明的布局或配对结构不一致.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// 非法参数.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 反卷积矩阵不可用.
    #[error("numerical error: {0}")]
    Numerical(#[from] NumericalError),

    /// 读写 nifti 文件错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 读 npz 文件错误.
    #[error("npz read error: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    /// 写 npz 文件错误.
    #[error("npz write error: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 其他底层 I/O 错误.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// 形状错误.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// 原始数据列数不能被 TI 个数整除. 参数依次为列数和 TI 个数.
    #[error("{0} columns cannot be divided into {1} TIs")]
    IndivisibleTis(usize, usize),

    /// 配对数据中, 每个 TI 的测量数为奇数. 参数为所在 TI 索引和测量数.
    #[error("TI {0} has an odd number of measurements ({1}) but pairs were requested")]
    OddPairs(usize, usize),

    /// 两组数据的 TI 个数不一致.
    #[error("TI count mismatch: {0} vs {1}")]
    TiCountMismatch(usize, usize),

    /// 同一 TI 的两个矩阵形状不一致. 参数依次为 TI 索引和两个形状.
    #[error("TI {0}: shape {1:?} does not match {2:?}")]
    TiShapeMismatch(usize, (usize, usize), (usize, usize)),

    /// 各 TI 的体素 (行) 数不一致.
    #[error("TI {0} has {1} voxels, expected {2}")]
    VoxelCountMismatch(usize, usize, usize),

    /// 交错输出要求各 TI 的测量数相同.
    #[error("TI {0} has {1} measurements, expected {2} for interleaved output")]
    RaggedRepeats(usize, usize, usize),

    /// 操作要求非配对数据, 但输入为 tag / control 配对数据.
    #[error("operation requires unpaired data")]
    Paired,

    /// 空数据集.
    #[error("dataset contains no TIs")]
    Empty,

    /// 体积的空间形状与掩膜不一致.
    #[error("volume grid {0:?} does not match mask grid {1:?}")]
    GridMismatch((usize, usize, usize), (usize, usize, usize)),

    /// 矩阵行数与掩膜体素个数不一致.
    #[error("matrix has {0} rows but mask holds {1} voxels")]
    RowMismatch(usize, usize),

    /// 列索引越界. 参数依次为索引和列数.
    #[error("column {0} is out of range for {1} columns")]
    ColumnOutOfRange(usize, usize),

    /// 读取的 nifti 体积维数不符合要求. 参数为实际维数.
    #[error("unexpected {0}D volume")]
    Dimensionality(usize),

    /// 归档中缺少某个 TI 的矩阵.
    #[error("archive has no entry for TI {0}")]
    MissingTi(usize),

    /// AIF 的长度或形状与数据不一致.
    #[error("AIF shape {0:?} does not match data shape {1:?}")]
    AifMismatch((usize, usize), (usize, usize)),
}

/// 配置错误.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// TI 个数必须为正.
    #[error("number of TIs must be positive")]
    ZeroTis,

    /// epoch 步进与长度必须为正. 参数依次为 `epadv` 和 `epol`.
    #[error("epoch advance ({0}) and length ({1}) must be positive")]
    EpochSize(usize, usize),

    /// 核半径至少为 1 个体素.
    #[error("kernel radius must be at least 1 voxel")]
    KernelRadius,

    /// 截断阈值必须在 `[0, 1)` 内.
    #[error("SVD truncation {0} must lie in [0, 1)")]
    Truncation(f64),

    /// 条件数阈值必须在 `[0, 1)` 内.
    #[error("rcond {0} must lie in [0, 1)")]
    Rcond(f64),

    /// 部分容积比例必须是 `[0, 1]` 内的有限值. 参数为体素索引和取值.
    #[error("partial volume fraction {1} at {0:?} is outside [0, 1]")]
    PvFraction((usize, usize, usize), f64),
}

/// 数值错误.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalError {
    /// AIF 含非有限值, 或卷积矩阵的所有奇异值都接近 0. 参数为体素索引
    /// (全局 AIF 时为 `None`) 和出错的值 (非有限的 AIF 采样或最大奇异值).
    #[error("convolution matrix is unusable (voxel {0:?}, largest singular value {1})")]
    DegenerateAif(Option<usize>, f64),

    /// SVD 在迭代上限内未收敛. 参数为体素索引 (全局 AIF 时为 `None`).
    #[error("SVD did not converge (voxel {0:?})")]
    NotConverged(Option<usize>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let e: AslError = ShapeError::IndivisibleTis(7, 2).into();
        assert!(matches!(e, AslError::Shape(ShapeError::IndivisibleTis(7, 2))));
        assert_eq!(
            e.to_string(),
            "shape error: 7 columns cannot be divided into 2 TIs"
        );

        let e: AslError = ConfigError::KernelRadius.into();
        assert!(matches!(e, AslError::Config(ConfigError::KernelRadius)));
    }
}
