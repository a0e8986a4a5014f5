//! 体积/矩阵基础数据结构.
//!
//! 核心算法只依赖一件事: 体积数据可以按掩膜展平为 (掩膜内体素) × (时间点) 的矩阵,
//! 并且可以还原. 体积统一按照 `(z, h, w)` (以及末尾的时间维 `t`) 组织,
//! 掩膜内体素按行优先序编号.

use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis};

use crate::error::{AslResult, ShapeError};
use crate::Idx3d;

mod kernel;

pub use kernel::{Kernel, KernelShape};

/// 查找表中不属于掩膜的体素.
const UNMASKED: usize = usize::MAX;

/// 三维掩膜. 决定哪些体素参与计算, 以及它们在矩阵中的行顺序.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    /// 掩膜内体素的三维索引, 按行优先存储. 第 `i` 个元素即矩阵第 `i` 行对应的体素.
    positions: Vec<Idx3d>,

    /// 体素到矩阵行的查找表. 掩膜外体素的值为 `UNMASKED`.
    rows: Array3<usize>,
}

impl Mask {
    /// 从体积创建掩膜. 值大于 0 的体素属于掩膜.
    pub fn from_volume<T>(vol: ArrayView3<T>) -> Self
    where
        T: num::Zero + PartialOrd + Copy,
    {
        Self::from_predicate(vol.dim(), |pos| vol[pos] > T::zero())
    }

    /// 创建包含所有体素的掩膜.
    pub fn full(shape: Idx3d) -> Self {
        Self::from_predicate(shape, |_| true)
    }

    fn from_predicate<F: Fn(Idx3d) -> bool>(shape: Idx3d, pred: F) -> Self {
        let mut rows = Array3::from_elem(shape, UNMASKED);
        let mut positions = Vec::new();
        for (pos, row) in rows.indexed_iter_mut() {
            if pred(pos) {
                *row = positions.len();
                positions.push(pos);
            }
        }
        Self { positions, rows }
    }

    /// 掩膜所在网格的形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.rows.dim()
    }

    /// 掩膜内的体素个数, 即展平后矩阵的行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// 掩膜是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// 掩膜内所有体素的三维索引, 按矩阵行顺序排列.
    #[inline]
    pub fn positions(&self) -> &[Idx3d] {
        &self.positions
    }

    /// 体素 `pos` 对应的矩阵行. 越界或不在掩膜内时返回 `None`.
    #[inline]
    pub fn row_of(&self, pos: Idx3d) -> Option<usize> {
        self.rows.get(pos).copied().filter(|r| *r != UNMASKED)
    }

    /// 体素 `pos` 是否在掩膜内.
    #[inline]
    pub fn contains(&self, pos: Idx3d) -> bool {
        self.row_of(pos).is_some()
    }

    /// 检查 `shape` 是否与掩膜网格一致.
    pub fn check_grid(&self, shape: Idx3d) -> AslResult<()> {
        if shape != self.shape() {
            return Err(ShapeError::GridMismatch(shape, self.shape()).into());
        }
        Ok(())
    }

    /// 检查矩阵行数是否与掩膜体素个数一致.
    pub fn check_rows(&self, rows: usize) -> AslResult<()> {
        if rows != self.len() {
            return Err(ShapeError::RowMismatch(rows, self.len()).into());
        }
        Ok(())
    }

    /// 将 `(z, h, w, t)` 的 4D 体积展平为 (掩膜体素) × `t` 的矩阵.
    pub fn flatten<T: Copy + num::Zero>(&self, vol: ArrayView4<T>) -> AslResult<Array2<T>> {
        let (z, h, w, t) = vol.dim();
        self.check_grid((z, h, w))?;
        let mut out = Array2::zeros((self.len(), t));
        for (mut row, &(z, h, w)) in out.axis_iter_mut(Axis(0)).zip(self.positions.iter()) {
            row.assign(&vol.slice(ndarray::s![z, h, w, ..]));
        }
        Ok(out)
    }

    /// 将 3D 体积展平为掩膜体素组成的向量 (单列矩阵).
    pub fn flatten_3d<T: Copy + num::Zero>(&self, vol: ArrayView3<T>) -> AslResult<Array2<T>> {
        self.check_grid(vol.dim())?;
        Ok(Array2::from_shape_fn((self.len(), 1), |(r, _)| {
            vol[self.positions[r]]
        }))
    }

    /// `Self::flatten` 的逆操作. 掩膜外体素填 0.
    pub fn unflatten<T: Copy + num::Zero>(&self, data: ArrayView2<T>) -> AslResult<Array4<T>> {
        let (rows, t) = data.dim();
        self.check_rows(rows)?;
        let (z, h, w) = self.shape();
        let mut out = Array4::zeros((z, h, w, t));
        for (row, &(z, h, w)) in data.axis_iter(Axis(0)).zip(self.positions.iter()) {
            out.slice_mut(ndarray::s![z, h, w, ..]).assign(&row);
        }
        Ok(out)
    }

    /// 将矩阵的第 `col` 列还原为 3D 体积. 掩膜外体素填 0. `col` 越界时返回 `Err`.
    pub fn unflatten_3d<T: Copy + num::Zero>(
        &self,
        data: ArrayView2<T>,
        col: usize,
    ) -> AslResult<Array3<T>> {
        self.check_rows(data.nrows())?;
        if col >= data.ncols() {
            return Err(ShapeError::ColumnOutOfRange(col, data.ncols()).into());
        }
        let mut out = Array3::zeros(self.shape());
        for (&v, &pos) in data.column(col).iter().zip(self.positions.iter()) {
            out[pos] = v;
        }
        Ok(out)
    }

    /// 获取体素 `center` 在核 `kernel` 覆盖范围内、且位于掩膜内的所有邻居的矩阵行.
    /// 结果包含 `center` 本身 (若它在掩膜内), 按行优先序排列.
    pub fn neighbour_rows(&self, center: Idx3d, kernel: &Kernel) -> Vec<usize> {
        kernel
            .window(center, self.shape())
            .filter_map(|pos| self.row_of(pos))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mask() -> Mask {
        let mut vol = Array3::<f32>::zeros((2, 3, 4));
        vol[(0, 0, 1)] = 1.0;
        vol[(0, 2, 3)] = 0.5;
        vol[(1, 1, 0)] = 2.0;
        vol[(1, 1, 1)] = -1.0; // 负值不属于掩膜
        Mask::from_volume(vol.view())
    }

    #[test]
    fn test_mask_order() {
        let mask = sample_mask();
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.positions(), &[(0, 0, 1), (0, 2, 3), (1, 1, 0)]);
        assert_eq!(mask.row_of((0, 2, 3)), Some(1));
        assert_eq!(mask.row_of((1, 1, 1)), None);
        assert_eq!(mask.row_of((5, 0, 0)), None);
        assert!(Mask::full((2, 2, 2)).positions().len() == 8);

        let everything = Kernel::cube(usize::MAX).unwrap();
        assert_eq!(mask.neighbour_rows((0, 2, 3), &everything), vec![0, 1, 2]);
    }

    #[test]
    fn test_flatten_unflatten() {
        let mask = sample_mask();
        let vol = Array4::from_shape_fn((2, 3, 4, 5), |(z, h, w, t)| {
            (z * 1000 + h * 100 + w * 10 + t) as f64
        });
        let mat = mask.flatten(vol.view()).unwrap();
        assert_eq!(mat.dim(), (3, 5));
        assert_eq!(mat[(1, 4)], 234.0);
        assert_eq!(mat[(2, 0)], 1100.0);

        let back = mask.unflatten(mat.view()).unwrap();
        for (pos, v) in back.indexed_iter() {
            let (z, h, w, _) = pos;
            if mask.contains((z, h, w)) {
                assert_eq!(*v, vol[pos]);
            } else {
                assert_eq!(*v, 0.0);
            }
        }

        let single = mask.unflatten_3d(mat.view(), 4).unwrap();
        assert_eq!(single[(0, 2, 3)], 234.0);
        assert_eq!(
            mask.flatten_3d(single.view()).unwrap().column(0).to_vec(),
            mat.column(4).to_vec()
        );
        let ncols = mat.ncols();
        assert!(matches!(
            mask.unflatten_3d(mat.view(), ncols),
            Err(crate::error::AslError::Shape(ShapeError::ColumnOutOfRange(c, n))) if c == ncols && n == ncols
        ));
    }

    #[test]
    fn test_shape_errors() {
        let mask = sample_mask();
        let vol = Array4::<f64>::zeros((2, 3, 5, 1));
        assert!(mask.flatten(vol.view()).is_err());
        let mat = Array2::<f64>::zeros((4, 2));
        assert!(mask.unflatten(mat.view()).is_err());
    }
}
