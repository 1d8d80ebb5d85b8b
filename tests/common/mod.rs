#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use ndarray::Array2;

/// Where a synthetic slice says it belongs.
#[derive(Clone, Copy)]
pub enum Placement {
    Position(f64),
    Instance(i64),
    Both(f64, i64),
    Nowhere,
}

pub fn uniform(rows: usize, columns: usize, value: u16) -> Array2<u16> {
    Array2::from_elem((rows, columns), value)
}

fn strs(values: &[String]) -> PrimitiveValue {
    PrimitiveValue::Strs(values.iter().cloned().collect())
}

/// Write a single-frame 16 bit unsigned MONOCHROME2 CT slice to `dir/name`.
pub fn write_slice(dir: &Path, name: &str, pixels: &Array2<u16>, placement: Placement) -> PathBuf {
    let bytes = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_frame(dir, name, pixels.dim(), bytes, false, placement)
}

/// Like [`write_slice`] with PixelRepresentation 1, as most CT scanners
/// store Hounsfield units.
pub fn write_signed_slice(
    dir: &Path,
    name: &str,
    pixels: &Array2<i16>,
    placement: Placement,
) -> PathBuf {
    let bytes = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_frame(dir, name, pixels.dim(), bytes, true, placement)
}

fn write_frame(
    dir: &Path,
    name: &str,
    (rows, columns): (usize, usize),
    bytes: Vec<u8>,
    signed: bool,
    placement: Placement,
) -> PathBuf {
    let instance_uid = format!("2.25.{}", name.bytes().map(u64::from).sum::<u64>());
    let mut obj = InMemDicomObject::new_empty();
    let mut put = |tag, vr, value: PrimitiveValue| {
        obj.put(DataElement::new(tag, vr, value));
    };

    put(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE));
    put(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(instance_uid.as_str()));
    put(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P-0042"));
    put(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("DOE^JOHN"));
    put(tags::PATIENT_AGE, VR::AS, PrimitiveValue::from("054Y"));
    put(tags::PATIENT_SEX, VR::CS, PrimitiveValue::from("M "));
    put(tags::STUDY_DATE, VR::DA, PrimitiveValue::from("20240131"));

    match placement {
        Placement::Position(z) | Placement::Both(z, _) => {
            let position = ["-120".to_string(), "-100".to_string(), z.to_string()];
            put(tags::IMAGE_POSITION_PATIENT, VR::DS, strs(&position));
        }
        _ => {}
    }
    match placement {
        Placement::Instance(n) | Placement::Both(_, n) => {
            put(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from(n.to_string()));
        }
        _ => {}
    }

    put(tags::PIXEL_SPACING, VR::DS, strs(&["0.5".to_string(), "0.5".to_string()]));
    put(tags::SLICE_THICKNESS, VR::DS, PrimitiveValue::from("2"));

    put(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16));
    put(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from("MONOCHROME2"),
    );
    put(tags::ROWS, VR::US, PrimitiveValue::from(rows as u16));
    put(tags::COLUMNS, VR::US, PrimitiveValue::from(columns as u16));
    put(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16));
    put(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16));
    put(
        tags::PIXEL_REPRESENTATION,
        VR::US,
        PrimitiveValue::from(u16::from(signed)),
    );

    put(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(bytes));

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(instance_uid),
        )
        .unwrap();

    let path = dir.join(name);
    file.write_to_file(&path).unwrap();
    path
}

/// `count` uniform slices at z = 0, 1, ... written in reverse name order,
/// with the value of slice z being `value(z)`.
pub fn write_series(
    dir: &Path,
    count: usize,
    shape: (usize, usize),
    value: impl Fn(usize) -> u16,
) {
    for z in 0..count {
        let name = format!("slice_{:03}.dcm", count - 1 - z);
        let pixels = uniform(shape.0, shape.1, value(z));
        write_slice(dir, &name, &pixels, Placement::Position(z as f64));
    }
}
