//! 3D 体数据与只读采样.

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::OUT_OF_BOUNDS_INTENSITY;
use crate::{Affine, Idx3d, TrackError, TrackResult, Vec3};

pub mod phantom;

/// 对 3D 标量体数据的只读访问.
///
/// 所有方法都不修改体数据, 因此实现者可以被多个追踪任务并发读取.
pub trait VolumeSampler {
    /// 体素个数, 顺序为 `(nx, ny, nz)`.
    fn shape(&self) -> Idx3d;

    /// 体素 -> 物理坐标的仿射变换.
    fn ijk_to_ras(&self) -> &Affine;

    /// 物理 -> 体素坐标的仿射变换, 是 [`Self::ijk_to_ras`] 的逆.
    fn ras_to_ijk(&self) -> &Affine;

    /// 读取整数索引处的强度. 越界时 panic.
    fn value_at(&self, idx: Idx3d) -> f32;

    /// 单个体素在 `(i, j, k)` 三个方向的尺寸, 以毫米为单位.
    fn spacing(&self) -> [f64; 3] {
        let m = self.ijk_to_ras().linear();
        let col = |c: usize| (m[0][c].powi(2) + m[1][c].powi(2) + m[2][c].powi(2)).sqrt();
        [col(0), col(1), col(2)]
    }

    /// 检查整数索引是否合法.
    #[inline]
    fn check(&self, (i, j, k): &Idx3d) -> bool {
        let (nx, ny, nz) = self.shape();
        *i < nx && *j < ny && *k < nz
    }

    /// 将小数体素坐标四舍五入为整数索引. 越界时返回 `None`.
    fn round_index(&self, p: Vec3) -> Option<Idx3d> {
        let (nx, ny, nz) = self.shape();
        let r = p.round();
        // `contains` 对 NaN 返回 false.
        let ok = (0.0..nx as f64).contains(&r.x)
            && (0.0..ny as f64).contains(&r.y)
            && (0.0..nz as f64).contains(&r.z);
        ok.then(|| (r.x as usize, r.y as usize, r.z as usize))
    }

    /// 小数体素坐标 (四舍五入后) 是否在体数据内.
    #[inline]
    fn contains(&self, p: Vec3) -> bool {
        self.round_index(p).is_some()
    }

    /// 采样小数体素坐标处的强度 (最近邻). 越界时返回
    /// [`OUT_OF_BOUNDS_INTENSITY`], 从不 panic.
    #[inline]
    fn sample(&self, p: Vec3) -> f64 {
        match self.round_index(p) {
            Some(idx) => self.value_at(idx) as f64,
            None => OUT_OF_BOUNDS_INTENSITY,
        }
    }

    /// 体素坐标 -> 物理坐标.
    #[inline]
    fn grid_to_physical(&self, p: Vec3) -> Vec3 {
        self.ijk_to_ras().apply(p)
    }

    /// 物理坐标 -> 体素坐标 (小数).
    #[inline]
    fn physical_to_grid(&self, p: Vec3) -> Vec3 {
        self.ras_to_ijk().apply(p)
    }

    /// 体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (nx, ny, nz) = self.shape();
        nx * ny * nz
    }
}

/// 3D 标量体数据, 包括强度数组和体素 -> 物理坐标的仿射变换.
///
/// 强度以 `f32` 保存, 内部按 `(k, j, i)` 即 `(z, H, W)` 的顺序存储,
/// 但所有公开接口都使用 `(i, j, k)` 顺序.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    ijk_to_ras: Affine,
    ras_to_ijk: Affine,
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> (usize, usize, usize) {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 从 nifti header 中提取体素 -> 物理坐标变换.
///
/// 优先使用 sform; 没有 sform 时只使用 pixdim 和 quatern 偏移 (忽略四元数旋转).
fn affine_from_header(h: &NiftiHeader) -> Affine {
    if h.sform_code > 0 {
        let row = |r: [f32; 4]| r.map(|v| v as f64);
        Affine::from_rows([row(h.srow_x), row(h.srow_y), row(h.srow_z)])
    } else {
        let [_, w, hh, z, ..] = h.pixdim;
        let origin = Vec3::new(h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64);
        Affine::from_spacing([w.abs() as f64, hh.abs() as f64, z.abs() as f64], origin)
    }
}

impl Volume {
    /// 构建体数据. `data` 的形状为 `(nz, ny, nx)`.
    ///
    /// 如果数据为空、含有非有限值或变换不可逆, 则返回 `Err`.
    pub fn new(data: Array3<f32>, ijk_to_ras: Affine) -> TrackResult<Self> {
        if data.is_empty() {
            return Err(TrackError::InvalidVolume("volume has no voxel".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::InvalidVolume(
                "volume contains non-finite intensities".to_string(),
            ));
        }
        let ras_to_ijk = ijk_to_ras.inverse().map_err(|_| {
            TrackError::InvalidVolume("ijk -> ras transform is singular".to_string())
        })?;
        Ok(Self {
            data,
            ijk_to_ras,
            ras_to_ijk,
        })
    }

    /// 以轴对齐的体素尺寸 `spacing` (顺序 `(i, j, k)`) 和原点 `origin` 构建体数据.
    #[inline]
    pub fn from_spacing(data: Array3<f32>, spacing: [f64; 3], origin: Vec3) -> TrackResult<Self> {
        Self::new(data, Affine::from_spacing(spacing, origin))
    }

    /// 打开 nii 文件格式的 3D 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        let (z, h, w) = get_shape_from_header(&header);

        // [W, H, z] -> [z, H, W].
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        let data = Array3::<f32>::from_shape_vec((z, h, w), data.into_raw_vec())
            .map_err(|e| TrackError::InvalidVolume(e.to_string()))?;

        log::debug!(
            "loaded volume {} with shape (i, j, k) = ({w}, {h}, {z})",
            path.as_ref().display()
        );
        Self::new(data, affine_from_header(&header))
    }

    /// 获得数据的一份不可变 shallow copy, 形状为 `(nz, ny, nx)`.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 强度的最小值和最大值.
    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

impl VolumeSampler for Volume {
    #[inline]
    fn shape(&self) -> Idx3d {
        let (z, h, w) = self.data.dim();
        (w, h, z)
    }

    #[inline]
    fn ijk_to_ras(&self) -> &Affine {
        &self.ijk_to_ras
    }

    #[inline]
    fn ras_to_ijk(&self) -> &Affine {
        &self.ras_to_ijk
    }

    #[inline]
    fn value_at(&self, idx: Idx3d) -> f32 {
        self[idx]
    }
}

impl Index<Idx3d> for Volume {
    type Output = f32;

    /// `(i, j, k)` 索引.
    #[inline]
    fn index(&self, (i, j, k): Idx3d) -> &Self::Output {
        &self.data[(k, j, i)]
    }
}
