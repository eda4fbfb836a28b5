//! 从归档目录到切片图像的完整流程.

use byteordered::Endianness;
use oasis_berry::prelude::*;
use oasis_berry::volume::{AnalyzeHeader, Datatype};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const BASE: &str = "OAS1_0001_MR1_mpr-1_anon";

fn write_analyze_pair(dir: &Path, shape: [usize; 3]) {
    fs::create_dir_all(dir).unwrap();
    let header = AnalyzeHeader::new(Endianness::Big, &shape, Datatype::I16).unwrap();
    header
        .to_writer(File::create(dir.join(format!("{BASE}.hdr"))).unwrap())
        .unwrap();
    let mut img = BufWriter::new(File::create(dir.join(format!("{BASE}.img"))).unwrap());
    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                let v = ((x + y + z) % 97) as i16;
                img.write_all(&v.to_be_bytes()).unwrap();
            }
        }
    }
    img.flush().unwrap();
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map_or(0, |it| it.filter_map(|e| e.ok()).count())
}

#[test]
fn test_catalog_and_convert() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_analyze_pair(&root.join("Original/OAS1/OAS1_0001_MR1/RAW"), [40, 170, 180]);
    // 派生目录中的同名文件不进入目录表.
    let derived = root.join("Original/OAS1/OAS1_0001_MR1/PROCESSED/MPRAGE/T88_111");
    fs::create_dir_all(&derived).unwrap();
    fs::write(derived.join("OAS1_0001_MR1_mpr_n4_anon_111_t88_gfc.img"), b"").unwrap();
    fs::write(
        root.join("oasis1_cross-sectional.csv"),
        "ID,M/F,Age,CDR,Delay\nOAS1_0001_MR1,F,74,0,\nOAS1_0002_MR1,M,55,0.5,\n",
    )
    .unwrap();

    let layout = ArchiveLayout::open(root).unwrap();
    let catalog = Catalog::build(root).unwrap();
    assert_eq!(catalog.len(), 2);
    for row in catalog.rows() {
        assert_eq!(row.file_name_wout_format, BASE);
        assert_eq!(row.label, "non-demented");
        assert_eq!(row.match_tier, "cross-sectional");
    }
    catalog.persist(layout.catalog_path()).unwrap();
    let reloaded = Catalog::load(layout.catalog_path()).unwrap();
    assert_eq!(reloaded.rows(), catalog.rows());

    // 派生文件在独立枚举中出现, 但不算作差异.
    assert_eq!(scan_files(layout.original()).len(), 3);
    assert!(catalog.compare_with(&raw_listing(layout.original())).is_clean());

    let opts = ConvertOptions {
        workers: 2,
        frames: 1,
    };
    let out = layout.preprocessed();
    let report = convert(layout.original(), &out, &reloaded, &opts).unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.converted, 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.images_written, 20 + 61 + 61);
    assert_eq!(report.out_of_bounds, 0);

    let sagittal = out.join("Sagittal/non-demented");
    assert_eq!(count_files(&sagittal), 20);
    assert!(sagittal
        .join(format!("Slice_10_{BASE}_sagittal_img.png"))
        .is_file());
    assert!(sagittal
        .join(format!("Slice_29_{BASE}_sagittal_img.png"))
        .is_file());
    assert_eq!(count_files(&out.join("Coronal/non-demented")), 61);
    assert_eq!(count_files(&out.join("Axial/non-demented")), 61);
    assert!(!out.join("Axial/unknown").exists());

    let png = image::open(out.join(format!("Axial/non-demented/Slice_100_{BASE}_axial_img.png")))
        .unwrap()
        .to_luma8();
    assert_eq!(png.dimensions(), (40, 170));

    // 第二次运行全部跳过.
    let again = convert(layout.original(), &out, &reloaded, &opts).unwrap();
    assert_eq!(again.resumed, 1);
    assert_eq!(again.converted, 0);
    assert_eq!(again.images_written, 0);
    assert_eq!(count_files(&out.join("Axial/non-demented")), 61);

    // 缩放与统计.
    let resized = resize_tree(&out, layout.results(), 128).unwrap();
    assert_eq!(resized.total, 142);
    assert_eq!(resized.resized, 142);
    assert!(resized.failures.is_empty());
    let png = image::open(
        layout
            .results()
            .join(format!("Axial/non-demented/Slice_100_{BASE}_axial_img.png")),
    )
    .unwrap()
    .to_luma8();
    assert_eq!(png.dimensions(), (128, 128));

    let stats = image_stats(&out).unwrap();
    assert_eq!(stats.len(), 142);
    assert!(stats.iter().all(|s| s.label == "non-demented"));
    assert!(stats
        .iter()
        .filter(|s| s.path.contains("_axial_"))
        .all(|s| (s.width, s.height) == (40, 170)));
    write_stats(&stats, layout.stats_path()).unwrap();
    assert!(layout.stats_path().is_file());
}

#[test]
fn test_missing_archive() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Catalog::build(dir.path().join("nope")),
        Err(Error::ArchiveNotFound(_))
    ));
    let opts = ConvertOptions::default();
    let catalog = Catalog::default();
    assert!(convert(dir.path().join("nope"), dir.path(), &catalog, &opts).is_err());
}
