//! 部分容积校正的邻域核消融实验.
//!
//! 在灰质信号缓慢变化的合成体模上比较不同邻域核的误差与耗时.
//! 核越大, 回归越稳定, 但 "邻域内信号恒定" 的假设偏差也越大.

mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Warn).unwrap();
    runner::run().analyze();
}
