//! 实验结果.

use crate::variants::Profile;
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

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Failed cases: {}", p.get_failed())?;
    writeln!(w, "{S4}Tracked needles: {}", p.get_tracked())?;
    writeln!(w, "{S4}Early stops: {}", p.get_early_stops())?;
    writeln!(w, "{S4}Tracking total time: {} us", p.get_track_time_us())?;
    writeln!(
        w,
        "{S4}Tracking average time: {} us",
        f64_to_display(p.get_avg_track_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    writeln!(
        w,
        "{S4}Average planar deviation: {} mm",
        f64_to_display(p.get_avg_deviation())
    )?;
    writeln!(w, "{S4}Worst planar deviation: {:.6} mm", p.get_worst_deviation())?;
    let t = p
        .get_most_time_consuming()
        .map_or_else(|| "/".to_string(), |d| d.as_micros().to_string());
    write!(w, "{S4}Most time-consuming needle costs {t} us")?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        utils::sep_to(&mut out)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut out)?;
            writeln!(out)?;
            utils::sep_to(&mut out)?;
        }
        Ok(())
    }
}
