use std::path::Path;

use dicom_object::{open_file, FileDicomObject, InMemDicomObject};
use ndarray::Array2;

use super::RawSlice;
use crate::error::LoadError;

type DicomFile = FileDicomObject<InMemDicomObject>;

/// 读取可选的整数属性.
fn opt_int(obj: &DicomFile, name: &str) -> Option<i32> {
    obj.element_by_name(name).ok()?.to_int::<i32>().ok()
}

/// 将未压缩的小端像素字节解释为 16-bit 强度.
///
/// 8-bit 数据按原样扩展; 有符号 16-bit 数据按位重新解释 (负值回绕).
fn samples(bytes: &[u8], bits_allocated: i32, n: usize) -> Result<Vec<u16>, String> {
    let values: Vec<u16> = match bits_allocated {
        8 => bytes.iter().map(|&b| b as u16).collect(),
        16 => bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect(),
        other => return Err(format!("unsupported BitsAllocated {other}")),
    };
    if values.len() < n {
        return Err(format!("expected {n} samples, found {}", values.len()));
    }
    Ok(values)
}

/// 读取单个 DICOM 文件.
///
/// 必须包含 `InstanceNumber`, `Rows`, `Columns` 和未压缩的像素数据; 多帧文件只取第一帧.
pub fn read_slice(path: &Path) -> Result<RawSlice, LoadError> {
    let invalid = |reason: String| LoadError::InvalidSlice {
        path: path.to_owned(),
        reason,
    };
    let required = |obj: &DicomFile, name: &str| {
        opt_int(obj, name).ok_or_else(|| invalid(format!("missing or malformed {name}")))
    };

    let obj = open_file(path).map_err(|e| invalid(e.to_string()))?;
    let instance_number = required(&obj, "InstanceNumber")?;
    let rows = required(&obj, "Rows")?.max(0) as usize;
    let cols = required(&obj, "Columns")?.max(0) as usize;
    let bits_allocated = opt_int(&obj, "BitsAllocated").unwrap_or(16);

    let position_z = obj
        .element_by_name("ImagePositionPatient")
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .and_then(|v| v.get(2).copied());
    let slice_location = obj
        .element_by_name("SliceLocation")
        .ok()
        .and_then(|e| e.to_float64().ok());

    let bytes = obj
        .element_by_name("PixelData")
        .map_err(|e| invalid(e.to_string()))?
        .to_bytes()
        .map_err(|e| invalid(e.to_string()))?;
    let mut values = samples(&bytes, bits_allocated, rows * cols).map_err(invalid)?;
    values.truncate(rows * cols);
    let pixels =
        Array2::from_shape_vec((rows, cols), values).map_err(|e| invalid(e.to_string()))?;

    Ok(RawSlice {
        path: path.to_owned(),
        instance_number,
        position_z,
        slice_location,
        spacing: None,
        pixels,
    })
}
