//! 空间邻域 (核).

use itertools::iproduct;
use std::ops::RangeInclusive;

use crate::error::{AslResult, ConfigError};
use crate::Idx3d;

/// 核的几何形状.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KernelShape {
    /// 三维立方体, 边长 `2 * radius + 1`.
    Cube,

    /// 同一水平切片 (相同 `z`) 上的正方形, 边长 `2 * radius + 1`.
    /// 经典的 Asllani 线性回归部分容积校正即使用该形状.
    InPlane,
}

/// 以某体素为中心的邻域.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kernel {
    radius: usize,
    shape: KernelShape,
}

impl Kernel {
    /// 创建半径为 `radius` (单位: 体素) 的核. `radius` 为 0 时返回 `Err`.
    pub fn new(radius: usize, shape: KernelShape) -> AslResult<Self> {
        if radius == 0 {
            return Err(ConfigError::KernelRadius.into());
        }
        Ok(Self { radius, shape })
    }

    /// 立方体核.
    #[inline]
    pub fn cube(radius: usize) -> AslResult<Self> {
        Self::new(radius, KernelShape::Cube)
    }

    /// 水平切片内的正方形核.
    #[inline]
    pub fn in_plane(radius: usize) -> AslResult<Self> {
        Self::new(radius, KernelShape::InPlane)
    }

    /// 核半径.
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// 核形状.
    #[inline]
    pub fn shape(&self) -> KernelShape {
        self.shape
    }

    /// 核内最多包含的体素个数 (不考虑网格边界).
    pub fn capacity(&self) -> usize {
        let side = self.radius.saturating_mul(2).saturating_add(1);
        match self.shape {
            KernelShape::Cube => side.saturating_pow(3),
            KernelShape::InPlane => side.saturating_pow(2),
        }
    }

    /// 按行优先序迭代以 `center` 为中心、被裁剪到网格 `grid` 之内的核覆盖体素.
    pub fn window(&self, center: Idx3d, grid: Idx3d) -> impl Iterator<Item = Idx3d> {
        let (cz, ch, cw) = center;
        let (gz, gh, gw) = grid;
        let zr = match self.shape {
            KernelShape::Cube => clipped(cz, self.radius, gz),
            KernelShape::InPlane => clipped(cz, 0, gz),
        };
        iproduct!(zr, clipped(ch, self.radius, gh), clipped(cw, self.radius, gw))
    }
}

/// `[c - r, c + r] ∩ [0, len)`. `len` 为 0 时返回空区间.
#[inline]
fn clipped(c: usize, r: usize, len: usize) -> RangeInclusive<usize> {
    if len == 0 {
        #[allow(clippy::reversed_empty_ranges)]
        return 1..=0;
    }
    c.saturating_sub(r)..=c.saturating_add(r).min(len - 1)
}
