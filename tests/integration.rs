use byteorder::{ByteOrder, LittleEndian};
use mmview::{
    DatasetDescriptor, ElementType, Endian, EnumerationError, IndexError, MapFileError,
    MappedFile, MetadataIndex, NpzContainer, NpzWriter, ScalarKind, Session, SessionError, Value,
    ViewError,
};
use std::{fs::File, path::Path};
use tempfile::TempDir;

const ROWS: usize = 20;
const COLS: usize = 5;

fn grid_values() -> Vec<f64> {
    (0..ROWS * COLS).map(|n| n as f64 * 0.5 - 3.0).collect()
}

/// Writes the scenario container: `a` and `c` stored, `b` compressed when
/// compression is available.
fn write_grid(path: &Path) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    npz.add_array("a", &[3], &[10i32, -20, 30]).unwrap();
    #[cfg(feature = "compressed-npz")]
    npz.add_compressed_array("b", &[4, 4], &[1.0f32; 16]).unwrap();
    npz.add_array("c", &[ROWS, COLS], &grid_values()).unwrap();
    npz.finish().unwrap();
}

fn grid_file() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.npz");
    write_grid(&path);
    (dir, path)
}

fn index_of(path: &Path) -> MetadataIndex {
    let mut container = NpzContainer::open(path).unwrap();
    MetadataIndex::build(&mut container).unwrap()
}

#[test]
fn contiguous_datasets_are_indexed_in_order() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let names: Vec<_> = index.iter().map(DatasetDescriptor::name).collect();
    assert_eq!(names, ["a", "c"]);

    let a = index.get("a").unwrap();
    assert_eq!(a.shape(), &[3]);
    assert_eq!(a.element_type(), ElementType::new(ScalarKind::I32, Endian::Little));
    let c = index.get("c").unwrap();
    assert_eq!(c.shape(), &[ROWS, COLS]);
    assert_eq!(c.element_type().kind(), ScalarKind::F64);
    assert_eq!(c.byte_len(), Some((ROWS * COLS * 8) as u64));
}

#[test]
fn view_reads_the_bytes_at_the_recorded_offset() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let raw = std::fs::read(&path).unwrap();
    let file = MappedFile::open(&path).unwrap();
    assert_eq!(file.len(), raw.len());

    let c = index.get("c").unwrap();
    let view = file.view::<f64>(c).unwrap();
    let at = c.byte_offset() as usize + (2 * COLS + 3) * 8;
    assert_eq!(view.get(&[2, 3]).unwrap(), LittleEndian::read_f64(&raw[at..at + 8]));
    assert_eq!(view.get(&[2, 3]).unwrap(), grid_values()[2 * COLS + 3]);

    let a = file.view::<i32>(index.get("a").unwrap()).unwrap();
    assert_eq!(a.to_vec(), [10, -20, 30]);
}

#[test]
fn row_major_addresses_are_disjoint() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let file = MappedFile::open(&path).unwrap();
    let view = file.view::<f64>(index.get("c").unwrap()).unwrap();
    let mut seen = vec![false; ROWS * COLS];
    for r in 0..ROWS {
        for c in 0..COLS {
            let flat = view.flat_index(&[r, c]).unwrap();
            assert_eq!(flat, r * COLS + c);
            assert!(!seen[flat]);
            seen[flat] = true;
        }
    }
    assert!(seen.into_iter().all(|s| s));
    assert_eq!(view.strides(), &[COLS, 1]);
    let column: Vec<_> = view.lane(0, &[4]).unwrap().collect();
    assert_eq!(column.len(), ROWS);
    assert_eq!(column[7], grid_values()[7 * COLS + 4]);
}

#[test]
fn invalid_indices_are_rejected() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let file = MappedFile::open(&path).unwrap();
    let view = file.view::<f64>(index.get("c").unwrap()).unwrap();
    assert_eq!(
        view.get(&[ROWS, 0]),
        Err(IndexError::IndexOutOfRange { axis: 0, index: ROWS, extent: ROWS })
    );
    assert_eq!(view.get(&[0]), Err(IndexError::DimensionMismatch { expected: 2, actual: 1 }));
}

#[test]
fn oversized_descriptors_are_out_of_bounds() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let file = MappedFile::open(&path).unwrap();
    let c = index.get("c").unwrap();

    let past_end = DatasetDescriptor::new("c", file.len() as u64, vec![1], c.element_type());
    assert!(matches!(file.view::<f64>(&past_end), Err(ViewError::OutOfBounds { .. })));

    let too_long =
        DatasetDescriptor::new("c", c.byte_offset(), vec![ROWS * 1000, COLS], c.element_type());
    assert!(matches!(file.view::<f64>(&too_long), Err(ViewError::OutOfBounds { .. })));

    let last = DatasetDescriptor::new("tail", file.len() as u64 - 8, vec![1], c.element_type());
    assert!(file.view::<f64>(&last).is_ok());
}

#[test]
fn wrong_element_type_is_unsupported() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let file = MappedFile::open(&path).unwrap();
    let err = file.view::<i64>(index.get("c").unwrap()).unwrap_err();
    assert!(matches!(err, ViewError::UnsupportedType { requested: ScalarKind::I64, .. }));
}

#[test]
fn writes_persist_through_the_mapping() {
    let (_dir, path) = grid_file();
    let index = index_of(&path);
    let c = index.get("c").unwrap();
    {
        let mut file = MappedFile::open(&path).unwrap();
        file.view_mut::<f64>(c).unwrap().set(&[5, 1], 1234.5).unwrap();
        assert_eq!(file.view::<f64>(c).unwrap().get(&[5, 1]).unwrap(), 1234.5);
        file.flush().unwrap();
    }
    let file = MappedFile::open(&path).unwrap();
    let view = file.view::<f64>(c).unwrap();
    assert_eq!(view.get(&[5, 1]).unwrap(), 1234.5);
    assert_eq!(view.get(&[5, 2]).unwrap(), grid_values()[5 * COLS + 2]);

    // The container is still readable as an archive afterwards.
    let reindexed = index_of(&path);
    assert_eq!(reindexed.get("c"), Some(c));
}

#[test]
fn missing_file_cannot_be_mapped() {
    let dir = tempfile::tempdir().unwrap();
    let err = MappedFile::open(dir.path().join("absent.npz")).unwrap_err();
    assert!(matches!(err, MapFileError::Open { .. }));
}

#[test]
fn groups_and_roots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_group("fields").unwrap();
    npz.add_array("fields/u", &[2, 2], &[1u16, 2, 3, 4]).unwrap();
    npz.add_array("fields/deep/v", &[2], &[-1i8, 1]).unwrap();
    npz.add_array("top", &[], &[9u64]).unwrap();
    npz.finish().unwrap();

    let index = index_of(&path);
    let names: Vec<_> = index.iter().map(|d| d.name().to_owned()).collect();
    assert_eq!(names, ["fields/u", "fields/deep/v", "top"]);

    let mut container = NpzContainer::open(&path).unwrap();
    let fields = MetadataIndex::build_from(&mut container, "/fields").unwrap();
    let names: Vec<_> = fields.iter().map(|d| d.name().to_owned()).collect();
    assert_eq!(names, ["u", "deep/v"]);

    let err = MetadataIndex::build_from(&mut container, "/missing").unwrap_err();
    assert!(matches!(err, EnumerationError::RootNotFound(_)));

    let file = MappedFile::open(&path).unwrap();
    let top = file.view::<u64>(index.get("top").unwrap()).unwrap();
    assert_eq!(top.ndim(), 0);
    assert_eq!(top.get(&[]).unwrap(), 9);
}

#[test]
fn session_selects_by_name() {
    let (_dir, path) = grid_file();
    let mut session = Session::open(&path).unwrap();
    assert_eq!(session.index().len(), 2);
    assert_eq!(session.mapping().path(), path.as_path());
    assert_eq!(session.mapping().len() as u64, std::fs::metadata(&path).unwrap().len());

    {
        let mut c = session.dataset_mut::<f64>("c").unwrap();
        c.subview_mut(0).unwrap().fill(0.25);
    }
    let c = session.dataset::<f64>("c").unwrap();
    assert!(c.subview(0).unwrap().iter().all(|v| v == 0.25));
    assert_eq!(c.get(&[1, 0]).unwrap(), grid_values()[COLS]);

    let a = session.any_dataset("a").unwrap();
    assert_eq!(a.get(&[1]).unwrap(), Value::Int(-20));
    let printed: Vec<_> = a.values().map(|v| v.to_string()).collect();
    assert_eq!(printed, ["10", "-20", "30"]);

    assert!(matches!(session.dataset::<f64>("b"), Err(ViewError::UnknownDataset(_))));
}

#[test]
fn session_reports_each_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.npz");
    assert!(matches!(Session::open(&missing), Err(SessionError::Container(_))));

    let garbage = dir.path().join("garbage.npz");
    std::fs::write(&garbage, b"not a zip archive").unwrap();
    assert!(matches!(Session::open(&garbage), Err(SessionError::Container(_))));
}

#[cfg(feature = "ndarray")]
#[test]
fn byte_dataset_as_ndarray() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bytes.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("img", &[2, 3], &[1u8, 2, 3, 4, 5, 6]).unwrap();
    npz.finish().unwrap();

    let session = Session::open(&path).unwrap();
    let arr = session.dataset::<u8>("img").unwrap().to_ndarray().unwrap();
    assert_eq!(arr.shape(), &[2, 3]);
    assert_eq!(arr[[1, 2]], 6);
}
