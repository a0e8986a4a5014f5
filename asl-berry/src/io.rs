//! nifti 与 npz 文件读写.
//!
//! nifti 文件按 `[w, h, z, (t)]` 存储体积. 本模块在读入时将其转换为
//! `[z, h, w, (t)]` 的标准布局, 写出时再转换回去, 与 [`crate::data::Mask`] 的约定一致.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{
    arr0, Array2, Array3, Array4, ArrayD, ArrayView2, ArrayView3, Axis, Ix0, Ix2, Ix4, OwnedRepr,
};
use ndarray_npy::{NpzReader, NpzWriter};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::INDEX_WIDTH;
use crate::data::Mask;
use crate::error::{AslResult, ShapeError};
use crate::reduce::{self, EpochSpec, EpochUnit};
use crate::{Layout, StdForm};

/// npz 归档中标记是否配对的条目名.
const PAIRED_ENTRY: &str = "paired";

fn read_nifti(path: &Path) -> AslResult<(Array4<f64>, NiftiHeader)> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = obj.header().clone();
    let data: ArrayD<f64> = obj.into_volume().into_ndarray()?;

    let ndim = data.ndim();
    let data = match ndim {
        3 => data.insert_axis(Axis(3)),
        4 => data,
        _ => return Err(ShapeError::Dimensionality(ndim).into()),
    };
    let data = data
        .into_dimensionality::<Ix4>()
        .map_err(|_| ShapeError::Dimensionality(ndim))?;

    // [w, h, z, t] -> [z, h, w, t].
    let data = data
        .permuted_axes([2, 1, 0, 3])
        .as_standard_layout()
        .into_owned();
    log::debug!("read {} with shape {:?}", path.display(), data.dim());
    Ok((data, header))
}

fn writer<'a>(path: &Path, header: Option<&'a NiftiHeader>) -> WriterOptions<'a> {
    // 参考头只提供空间信息, 维数与数据类型由写出的数组决定.
    match header {
        Some(h) => WriterOptions::new(path).reference_header(h),
        None => WriterOptions::new(path),
    }
}

/// 读取 4D ASL 数据并按掩膜展平.
///
/// 返回 (掩膜体素 × 采集) 的原始矩阵, 掩膜, 以及数据文件的 nifti 头.
/// 不提供 `mask_path` 时使用包含所有体素的掩膜. 3D 数据视为只有一次采集.
pub fn read_asl_nifti(
    data_path: impl AsRef<Path>,
    mask_path: Option<&Path>,
) -> AslResult<(Array2<f64>, Mask, NiftiHeader)> {
    let (data, header) = read_nifti(data_path.as_ref())?;
    let (z, h, w, _) = data.dim();
    let mask = match mask_path {
        Some(p) => Mask::from_volume(read_volume_nifti(p)?.0.view()),
        None => Mask::full((z, h, w)),
    };
    let raw = mask.flatten(data.view())?;
    Ok((raw, mask, header))
}

/// 读取 3D 体积 (掩膜, 部分容积比例图等). 只有一个时间点的 4D 文件也被接受.
pub fn read_volume_nifti(path: impl AsRef<Path>) -> AslResult<(Array3<f64>, NiftiHeader)> {
    let (data, header) = read_nifti(path.as_ref())?;
    if data.len_of(Axis(3)) != 1 {
        return Err(ShapeError::Dimensionality(4).into());
    }
    Ok((data.index_axis_move(Axis(3), 0), header))
}

/// 将 3D 体积写入 nifti 文件.
pub fn write_volume_nifti(
    path: impl AsRef<Path>,
    vol: ArrayView3<f64>,
    header: Option<&NiftiHeader>,
) -> AslResult<()> {
    let path = path.as_ref();
    writer(path, header).write_nifti(&vol.permuted_axes([2, 1, 0]))?;
    Ok(())
}

/// 将 (掩膜体素 × 时间点) 矩阵还原为 4D 体积并写入 nifti 文件. 掩膜外体素为 0.
pub fn write_matrix_nifti(
    path: impl AsRef<Path>,
    data: ArrayView2<f64>,
    mask: &Mask,
    header: Option<&NiftiHeader>,
) -> AslResult<()> {
    let path = path.as_ref();
    let vol = mask.unflatten(data)?;
    writer(path, header).write_nifti(&vol.view().permuted_axes([2, 1, 0, 3]))?;
    log::debug!("wrote {} with shape {:?}", path.display(), vol.dim());
    Ok(())
}

/// `{froot}{suffix}`.
fn with_suffix(froot: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(froot.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// 将每个 TI 分别写入 `{froot}_ti{NNN}.nii`, 返回写出的路径.
pub fn write_split_nifti(
    froot: impl AsRef<Path>,
    std: &StdForm,
    mask: &Mask,
    header: Option<&NiftiHeader>,
) -> AslResult<Vec<PathBuf>> {
    let froot = froot.as_ref();
    let mut paths = Vec::with_capacity(std.n_tis());
    for (ti, m) in std.iter().enumerate() {
        let path = with_suffix(froot, &format!("_ti{ti:0INDEX_WIDTH$}.nii"));
        write_matrix_nifti(&path, m.view(), mask, header)?;
        paths.push(path);
    }
    Ok(paths)
}

/// 划分 epoch 并将每个 epoch 写入 `{froot}{NNN}.nii`, 返回写出的路径.
///
/// [`EpochUnit::Repeat`] 的 epoch 按 `layout` 还原为原始布局后写出;
/// [`EpochUnit::Ti`] 的 epoch 是逐 TI 均值 (见 [`reduce::ti_epochs`]), 按 TI 顺序写出.
pub fn write_epochs_nifti(
    froot: impl AsRef<Path>,
    std: &StdForm,
    spec: &EpochSpec,
    unit: EpochUnit,
    mask: &Mask,
    layout: &Layout,
    header: Option<&NiftiHeader>,
) -> AslResult<Vec<PathBuf>> {
    let epochs = match unit {
        EpochUnit::Repeat => reduce::gen_epochs(std, spec)?
            .iter()
            .map(|epoch| layout.from_std_form(epoch))
            .collect::<AslResult<Vec<_>>>()?,
        EpochUnit::Ti => reduce::ti_epochs(std, spec)?,
    };

    let froot = froot.as_ref();
    let mut paths = Vec::with_capacity(epochs.len());
    for (i, epoch) in epochs.iter().enumerate() {
        let path = with_suffix(froot, &format!("{i:0INDEX_WIDTH$}.nii"));
        write_matrix_nifti(&path, epoch.view(), mask, header)?;
        paths.push(path);
    }
    Ok(paths)
}

/// 将标准形式数据存为 npz 归档. 每个 TI 的矩阵存为 `ti{NNN}`, 另有一个 `paired` 标记.
pub fn save_std_form_npz(path: impl AsRef<Path>, std: &StdForm) -> AslResult<()> {
    let mut npz = NpzWriter::new(File::create(path)?);
    for (ti, m) in std.iter().enumerate() {
        npz.add_array(format!("ti{ti:0INDEX_WIDTH$}"), m)?;
    }
    npz.add_array(PAIRED_ENTRY, &arr0(u8::from(std.is_paired())))?;
    npz.finish()?;
    Ok(())
}

/// 读取 [`save_std_form_npz`] 写出的归档. 缺少 `paired` 标记时视为非配对.
pub fn load_std_form_npz(path: impl AsRef<Path>) -> AslResult<StdForm> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;

    let mut paired = false;
    let mut entries = Vec::new();
    for (index, name) in names.iter().enumerate() {
        let name = name.strip_suffix(".npy").unwrap_or(name);
        if name == PAIRED_ENTRY {
            paired = npz.by_index::<OwnedRepr<u8>, Ix0>(index)?.into_scalar() != 0;
        } else if let Some(ti) = name.strip_prefix("ti").and_then(|n| n.parse::<usize>().ok()) {
            entries.push((ti, index));
        }
    }
    entries.sort_unstable();

    let mut tis = Vec::with_capacity(entries.len());
    for (expected, &(ti, index)) in entries.iter().enumerate() {
        if ti != expected {
            return Err(ShapeError::MissingTi(expected).into());
        }
        tis.push(npz.by_index::<OwnedRepr<f64>, Ix2>(index)?);
    }
    StdForm::new(tis, paired)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("asl-berry-{}-{name}", std::process::id()))
    }

    /// 不带掩膜读入, 再按 `mask` 展平.
    fn read_masked(path: &Path, mask: &Mask) -> Array2<f64> {
        let (all, full, _) = read_asl_nifti(path, None).unwrap();
        let vol = full.unflatten(all.view()).unwrap();
        mask.flatten(vol.view()).unwrap()
    }

    fn sample_mask_volume() -> Array3<f64> {
        Array3::from_shape_fn((2, 3, 4), |(z, h, w)| ((z + h + w) % 3 != 0) as u8 as f64)
    }

    #[test]
    fn test_nifti_round_trip() {
        let mask_vol = sample_mask_volume();
        let mask = Mask::from_volume(mask_vol.view());
        let vol = Array4::from_shape_fn((2, 3, 4, 5), |(z, h, w, t)| {
            (z * 1000 + h * 100 + w * 10 + t) as f64 + 0.5
        });
        let raw = mask.flatten(vol.view()).unwrap();

        let data_path = temp_path("data.nii");
        let mask_path = temp_path("mask.nii");
        write_matrix_nifti(&data_path, raw.view(), &mask, None).unwrap();
        write_volume_nifti(&mask_path, mask_vol.view(), None).unwrap();

        let (back, back_mask, _) = read_asl_nifti(&data_path, Some(mask_path.as_path())).unwrap();
        assert_eq!(back_mask, mask);
        assert_eq!(back, raw);

        let (full, full_mask, header) = read_asl_nifti(&data_path, None).unwrap();
        assert_eq!(full_mask.len(), 24);
        assert_eq!(full.dim(), (24, 5));
        assert_eq!(header.dim[1..5], [4, 3, 2, 5]);

        assert_eq!(read_volume_nifti(&mask_path).unwrap().0, mask_vol);
        assert!(read_volume_nifti(&data_path).is_err());

        std::fs::remove_file(data_path).unwrap();
        std::fs::remove_file(mask_path).unwrap();
    }

    #[test]
    fn test_write_split_and_epochs() {
        let mask = Mask::from_volume(sample_mask_volume().view());
        let raw = Array2::from_shape_fn((mask.len(), 8), |(r, c)| (r * 8 + c) as f64);
        let layout = Layout::new(2, true, true).unwrap();
        let std = layout.to_std_form(raw.view()).unwrap();

        let froot = temp_path("split");
        let paths = write_split_nifti(&froot, &std, &mask, None).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].to_string_lossy().ends_with("split_ti001.nii"));
        assert_eq!(read_masked(&paths[1], &mask), std[1]);

        let spec = EpochSpec::new(1, 1).unwrap();
        let eroot = temp_path("epoch");
        let epaths =
            write_epochs_nifti(&eroot, &std, &spec, EpochUnit::Repeat, &mask, &layout, None).unwrap();
        assert_eq!(epaths.len(), 2);
        assert!(epaths[0].to_string_lossy().ends_with("epoch000.nii"));
        assert_eq!(read_masked(&epaths[0], &mask).ncols(), 4);

        // 以 TI 为单位: 2 个 TI, 每个 epoch 1 个 TI 的 (均值 tag, 均值 control).
        let troot = temp_path("tiepoch");
        let tpaths =
            write_epochs_nifti(&troot, &std, &spec, EpochUnit::Ti, &mask, &layout, None).unwrap();
        assert_eq!(tpaths.len(), 2);
        let second = read_masked(&tpaths[1], &mask);
        assert_eq!(second, reduce::ti_epochs(&std, &spec).unwrap()[1]);

        for p in paths.into_iter().chain(epaths).chain(tpaths) {
            std::fs::remove_file(p).unwrap();
        }
    }

    #[test]
    fn test_npz_round_trip() {
        let std = StdForm::new(
            vec![
                Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f64),
                Array2::from_shape_fn((3, 2), |(r, c)| -((r + c) as f64)),
            ],
            true,
        )
        .unwrap();
        let path = temp_path("std.npz");
        save_std_form_npz(&path, &std).unwrap();
        assert_eq!(load_std_form_npz(&path).unwrap(), std);
        std::fs::remove_file(path).unwrap();
    }
}
