//! 对 `ct-needle::data::phantom` 的更一层封装. 提供固定的一组合成测试用例.

use ct_needle::prelude::*;

/// 一个合成测试用例: 一个体数据, 其中一根针的真实位置, 以及操作者点击的针尖.
#[derive(Clone, Debug)]
pub struct PhantomCase {
    /// 名称.
    pub name: &'static str,

    /// 体数据.
    pub volume: Volume,

    /// 真实针轴线的两端 (物理坐标), `from` 为针尖.
    pub truth: (Vec3, Vec3),

    /// 点击位置 (物理坐标), 相对针尖有少许偏移.
    pub click: Vec3,

    /// 针比周围组织亮.
    pub bright: bool,
}

impl PhantomCase {
    /// 物理点到真实针轴线的平面 (x, y) 距离, 轴线在 z 方向上线性插值.
    pub fn planar_error(&self, p: Vec3) -> f64 {
        let (a, b) = self.truth;
        let t = if a.z == b.z {
            0.0
        } else {
            ((p.z - a.z) / (b.z - a.z)).clamp(0.0, 1.0)
        };
        p.planar_distance(a.lerp(b, t))
    }
}

fn case(
    name: &'static str,
    phantom: NeedlePhantom,
    needle: PhantomNeedle,
    click_offset: Vec3,
    bright: bool,
) -> TrackResult<PhantomCase> {
    let volume = phantom.needle(needle).build()?;
    let from = volume.grid_to_physical(needle.to);
    let to = volume.grid_to_physical(needle.from);
    Ok(PhantomCase {
        name,
        truth: (from, to),
        click: from + click_offset,
        volume,
        bright,
    })
}

/// 全部合成测试用例.
///
/// 包括 CT 亮针 / MRI 暗针、竖直 / 倾斜针, 以及各向异性体素.
pub fn all_cases() -> TrackResult<Vec<PhantomCase>> {
    let ct = |shape| NeedlePhantom::new(shape).background(40.0);
    let mri = |shape| NeedlePhantom::new(shape).background(600.0);

    Ok(vec![
        case(
            "ct-vertical",
            ct((41, 41, 80)),
            PhantomNeedle {
                from: Vec3::new(20.0, 20.0, 0.0),
                to: Vec3::new(20.0, 20.0, 79.0),
                radius: 1.0,
                intensity: 2000.0,
            },
            Vec3::new(1.2, -0.8, 0.0),
            true,
        )?,
        case(
            "ct-tilted",
            ct((41, 41, 80)),
            PhantomNeedle {
                from: Vec3::new(12.0, 25.0, 0.0),
                to: Vec3::new(24.0, 19.0, 79.0),
                radius: 1.0,
                intensity: 2000.0,
            },
            Vec3::new(-1.0, 1.0, -1.0),
            true,
        )?,
        case(
            "mri-vertical",
            mri((41, 41, 80)),
            PhantomNeedle {
                from: Vec3::new(18.0, 22.0, 0.0),
                to: Vec3::new(18.0, 22.0, 79.0),
                radius: 1.0,
                intensity: 50.0,
            },
            Vec3::new(0.0, 1.5, 0.0),
            false,
        )?,
        case(
            "mri-anisotropic",
            mri((61, 61, 40)).spacing([0.5, 0.5, 2.0]),
            PhantomNeedle {
                from: Vec3::new(26.0, 30.0, 0.0),
                to: Vec3::new(34.0, 30.0, 39.0),
                radius: 2.0,
                intensity: 50.0,
            },
            Vec3::new(0.5, 0.5, 0.0),
            false,
        )?,
    ])
}
