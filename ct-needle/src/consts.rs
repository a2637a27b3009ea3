//! 通用常量.

/// 越界采样时返回的哨兵强度值.
pub const OUT_OF_BOUNDS_INTENSITY: f64 = 0.0;

/// 未匹配到模板孔位时使用的标签.
pub const UNASSIGNED_LABEL: &str = "--";

/// 模板相关常量.
pub mod template {
    /// 模板孔位总数.
    pub const HOLE_COUNT: usize = ROW_LABELS.len() * COLUMN_LABELS.len();

    /// 行标签 (大写), 从上到下.
    pub const ROW_LABELS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

    /// 列标签 (小写), 从左到右.
    pub const COLUMN_LABELS: [char; 7] = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];

    /// 相邻孔位间距 (单位: 毫米).
    pub const HOLE_PITCH_MM: f64 = 10.0;

    /// 超过该平面距离 (单位: 毫米) 的最近孔位不被接受.
    pub const MAX_MATCH_DISTANCE_MM: f64 = 15.0;
}

/// 追踪算法常量.
pub mod tracking {
    /// 二分法 (dichotomy) 质量门限: 候选点得分相对参考得分的最大允许偏差.
    pub const DICHOTOMY_THRESHOLD: f64 = 0.6;

    /// 二分法最大重试次数.
    pub const DICHOTOMY_MAX_RETRIES: u32 = 7;

    /// Bézier 曲线采样点数.
    pub const CURVE_SAMPLES: usize = 50;

    /// 每段候选线段上的插值点个数 (不含起点).
    pub const SEGMENT_SAMPLES: u32 = 10;
}

/// 针的显示颜色 (RGB, 0.0 ~ 1.0). 会话按顺序循环取用.
pub const PALETTE: [[f32; 3]; 12] = [
    [0.90, 0.10, 0.10],
    [0.10, 0.70, 0.20],
    [0.15, 0.35, 0.90],
    [0.95, 0.75, 0.10],
    [0.60, 0.20, 0.80],
    [0.10, 0.80, 0.80],
    [0.95, 0.45, 0.10],
    [0.55, 0.35, 0.20],
    [0.95, 0.40, 0.70],
    [0.50, 0.80, 0.10],
    [0.30, 0.30, 0.30],
    [0.10, 0.45, 0.55],
];

/// 手动验证针使用的颜色.
pub const VALIDATION_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
