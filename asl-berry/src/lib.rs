#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 ASL (动脉自旋标记) 灌注 MRI 时间序列的重排, 时间约简, AIF 反卷积,
//! 部分容积校正与缺失值填补.
//!
//! 所有操作都是同步的, 只借用输入并产生新的输出. 形状和参数错误在操作开始时即返回
//! [`AslError`]; 逐体素的数值退化在局部处理, 不会使整个操作失败.
//!
//! # 数据约定
//!
//! 1. 体积按 `(z, h, w)` (以及末尾的时间维 `t`) 组织. nifti 文件的 `[w, h, z, t]`
//!   布局在 [`io`] 中转换.
//! 2. 原始数据与标准形式矩阵均为 (掩膜内体素 × 列), 体素按 [`Mask`] 的行优先序编号.
//! 3. [`deconv::svd_deconvolve`] 的数据为 (时间点 × 体素).
//!
//! # 模块
//!
//! ### 布局转换 ✅
//!
//! 原始采集矩阵与按 TI 分组的标准形式 [`StdForm`] 之间的双向转换,
//! 支持分块/交错以及 tag/control 配对.
//!
//! 实现位于 `asl-berry/src/layout`.
//!
//! ### 配对拆分与合并 ✅
//!
//! 实现位于 `asl-berry/src/pairs.rs`.
//!
//! ### 时间约简 ✅
//!
//! 逐 TI 均值, epoch 划分 (末尾保留一个不完整窗口) 与 epoch 均值.
//!
//! 实现位于 `asl-berry/src/reduce`.
//!
//! ### 截断 SVD 反卷积 ✅
//!
//! 全局或逐体素 AIF. 实现位于 `asl-berry/src/deconv.rs`.
//!
//! ### 部分容积校正 ✅
//!
//! 邻域内灰质/白质线性回归. 实现位于 `asl-berry/src/pvc`.
//!
//! ### NaN 校正与掩膜内外推 ✅
//!
//! 实现位于 `asl-berry/src/fill.rs`.
//!
//! ### nifti / npz 读写 ✅
//!
//! 实现位于 `asl-berry/src/io.rs`.

/// 三维索引 `(z, h, w)`.
pub type Idx3d = (usize, usize, usize);

pub mod consts;
pub mod data;
pub mod deconv;
pub mod error;
pub mod fill;
pub mod io;
pub mod layout;
pub mod pairs;
pub mod prelude;
pub mod pvc;
pub mod reduce;

mod par;

/// 测试中按需开启日志输出. 重复初始化的错误被忽略.
#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

pub use data::{Kernel, KernelShape, Mask};
pub use error::{AslError, AslResult};
pub use layout::{Layout, StdForm};
