//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Kernel `{name}`:")?;
    writeln!(w, "{S4}Masked voxels: {}", p.get_voxels())?;
    writeln!(w, "{S4}Fallback voxels: {}", p.get_fallbacks())?;
    writeln!(w, "{S4}GM RMSE: {}", f64_to_display(p.get_rmse()))?;
    writeln!(w, "{S4}GM max abs error: {}", f64_to_display(p.get_max_err()))?;
    write!(w, "{S4}Correction time: {} us", p.get_time_us())?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl FromIterator<(&'static str, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 分析运行结果.
    pub fn analyze(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        utils::sep_to(&mut out);
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut out).unwrap();
            writeln!(out).unwrap();
            utils::sep_to(&mut out);
        }
    }
}
