//! 合成 ASL 体模. 灰质/白质真值信号已知, 便于量化部分容积校正的误差.

use asl_berry::{Idx3d, Mask};
use ndarray::{Array2, Array3, Array4};

/// 合成体模.
pub struct Phantom {
    /// 椭球形脑掩膜.
    pub mask: Mask,

    /// 灰质部分容积比例, 取值范围 `[0.1, 0.9]`.
    pub gm: Array3<f64>,

    /// 白质部分容积比例, 为 `0.8 * (1 - gm)`.
    pub wm: Array3<f64>,

    /// 混合后的信号 (掩膜体素 × 时间点).
    pub data: Array2<f64>,

    /// 灰质真值信号 (掩膜体素 × 时间点).
    pub truth_gm: Array2<f64>,
}

impl Phantom {
    /// 在 `grid` 上生成 `n_t` 个时间点的体模.
    ///
    /// 灰质信号沿 `w` 方向缓慢变化, 白质信号在空间上恒定, 两者都随时间线性增长.
    pub fn new(grid: Idx3d, n_t: usize) -> Self {
        let (gz, gh, gw) = grid;
        let centre = |i: usize, n: usize| (i as f64 + 0.5) / n as f64 * 2.0 - 1.0;

        let inside = Array3::from_shape_fn(grid, |(z, h, w)| {
            let r2 = centre(z, gz).powi(2) + centre(h, gh).powi(2) + centre(w, gw).powi(2);
            u8::from(r2 <= 1.0)
        });
        let mask = Mask::from_volume(inside.view());

        let gm = Array3::from_shape_fn(grid, |(_, h, w)| {
            let phase = std::f64::consts::TAU * w as f64 / gw as f64;
            0.5 + 0.4 * phase.sin() * (std::f64::consts::PI * h as f64 / gh as f64).cos()
        });
        let wm = gm.mapv(|g| 0.8 * (1.0 - g));

        let s_gm = |w: usize, t: usize| 60.0 + 10.0 * w as f64 / gw as f64 + 2.0 * t as f64;
        let s_wm = |t: usize| 20.0 + t as f64;

        let truth = Array4::from_shape_fn((gz, gh, gw, n_t), |(_, _, w, t)| s_gm(w, t));
        let mixed = Array4::from_shape_fn((gz, gh, gw, n_t), |(z, h, w, t)| {
            gm[(z, h, w)] * s_gm(w, t) + wm[(z, h, w)] * s_wm(t)
        });

        // 网格形状一致, 展平不会失败.
        let data = mask.flatten(mixed.view()).unwrap();
        let truth_gm = mask.flatten(truth.view()).unwrap();
        Self {
            mask,
            gm,
            wm,
            data,
            truth_gm,
        }
    }
}
