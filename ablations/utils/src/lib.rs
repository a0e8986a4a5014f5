//! 消融实验依赖的通用组件.

pub mod phantom;

const SEP: &str = "--------------------------------------------------------";

/// 向 `w` 写出简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) {
    writeln!(&mut w, "{SEP}").unwrap();
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}
