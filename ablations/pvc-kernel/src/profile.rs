//! 单个核配置的运行统计.

use std::time::{Duration, Instant};

/// ablation 数据统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 掩膜内体素个数.
    voxels: u64,

    /// 回退为原值的体素个数.
    fallbacks: u64,

    /// 参与误差统计的 (体素, 时间点) 个数. 回退体素不计入.
    samples: u64,

    /// 误差平方和.
    sq_err: f64,

    /// 最大绝对误差.
    max_err: f64,

    /// 校正本身的耗时 (不含体模生成).
    elapsed: Duration,

    since: Instant,
}

impl Profile {
    /// 初始化. 初始化时会视为已经开始计时.
    #[inline]
    pub fn new(voxels: usize) -> Self {
        Self {
            voxels: voxels as u64,
            fallbacks: 0,
            samples: 0,
            sq_err: 0.0,
            max_err: 0.0,
            elapsed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 结束计时.
    #[inline]
    pub fn stop(&mut self) {
        self.elapsed = self.since.elapsed();
    }

    /// 记录回退体素个数.
    #[inline]
    pub fn count_fallbacks(&mut self, n: usize) {
        self.fallbacks += n as u64;
    }

    /// 记录一个 (体素, 时间点) 的估计值与真值.
    #[inline]
    pub fn record(&mut self, estimate: f64, truth: f64) {
        let e = (estimate - truth).abs();
        self.samples += 1;
        self.sq_err += e * e;
        self.max_err = self.max_err.max(e);
    }

    /// 掩膜内体素个数.
    #[inline]
    pub fn get_voxels(&self) -> u64 {
        self.voxels
    }

    /// 回退体素个数.
    #[inline]
    pub fn get_fallbacks(&self) -> u64 {
        self.fallbacks
    }

    /// 均方根误差. 没有样本时返回 `None`.
    #[inline]
    pub fn get_rmse(&self) -> Option<f64> {
        match self.samples {
            0 => None,
            n => Some((self.sq_err / n as f64).sqrt()),
        }
    }

    /// 最大绝对误差. 没有样本时返回 `None`.
    #[inline]
    pub fn get_max_err(&self) -> Option<f64> {
        (self.samples > 0).then_some(self.max_err)
    }

    /// 以微秒为单位的校正耗时.
    #[inline]
    pub fn get_time_us(&self) -> u64 {
        self.elapsed.as_micros() as u64
    }
}
