//! 4D PET 体数据的帧选择与示踪剂切片范围.

use ndarray::Array4;
use nifti::writer::WriterOptions;
use oasis_berry::prelude::*;
use std::fs;
use std::path::Path;

const BASE: &str = "sub-OAS30001_ses-d0100_acq-FDG_pet";

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_owned))
        .collect();
    names.sort();
    names
}

#[test]
fn test_pet_frame_and_tracer_window() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let scans = root.join("Original/OAS3/OAS30001_PET_d0100/pet");
    fs::create_dir_all(&scans).unwrap();
    // 第 1 帧方差最大.
    let data = Array4::from_shape_fn((20, 24, 30, 3), |(x, y, z, t)| match t {
        1 => (x * 7 + y * 3 + z) as f32,
        _ => 5.0,
    });
    WriterOptions::new(scans.join(format!("{BASE}.nii.gz")))
        .write_nifti(&data)
        .unwrap();
    fs::write(
        root.join("OASIS3_UDSb4_cdr.csv"),
        "OASISID,OASIS_session_label,days_to_visit,CDRTOT\n\
         OAS30001,OAS30001_UDSb4_d0000,0,0\n\
         OAS30001,OAS30001_UDSb4_d0050,50,0.5\n\
         OAS30001,OAS30001_UDSb4_d0900,900,1\n",
    )
    .unwrap();

    let catalog = Catalog::build(root).unwrap();
    assert_eq!(catalog.len(), 1);
    let row = &catalog.rows()[0];
    assert_eq!(row.matched_day, Some(50));
    assert_eq!(row.match_tier, "window");
    assert_eq!(catalog.label_for(BASE), Diagnosis::VeryMildDementia);

    let layout = ArchiveLayout::open(root).unwrap();
    let out = layout.preprocessed();
    let report = convert(layout.original(), &out, &catalog, &ConvertOptions::default()).unwrap();
    assert_eq!(report.converted, 1, "{:?}", report.failures);
    // 矢状面 5..15, 轴状面 FDG 9..25, 冠状面固定窗口全部越界.
    assert_eq!(report.images_written, 10 + 16);
    assert_eq!(report.out_of_bounds, 61);
    assert!(!out.join("Coronal").exists());

    let axial = list(&out.join("Axial/very-mild-dementia"));
    assert_eq!(axial.len(), 16);
    assert_eq!(axial[0], format!("Slice_10_{BASE}_t1_axial_img.png"));
    assert!(axial.iter().all(|n| n.contains("_t1_")));
    assert_eq!(list(&out.join("Sagittal/very-mild-dementia")).len(), 10);

    let again = convert(layout.original(), &out, &catalog, &ConvertOptions::default()).unwrap();
    assert_eq!(again.resumed, 1);
}
