use std::fs;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use respack_archive::{
    build_archive, collect_files, ArchiveError, ArchiveSource, CompressionType, ResourceArchive,
};

fn write(root: &Path, rel: &str, data: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, data).unwrap();
    path
}

fn text(seed: &str) -> Vec<u8> {
    format!("{seed} frame 0 0 32 32\n").repeat(64).into_bytes()
}

#[test]
fn extract_all_reproduces_the_tree() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "gfx/ui/texture0.tex", &text("tex"));
    write(src.path(), "gfx/ui/icon.txt", &text("icon"));
    write(src.path(), "config/settings.yaml", &text("settings"));
    write(src.path(), "empty.dat", b"");

    for compression in [
        CompressionType::None,
        CompressionType::Fast,
        CompressionType::High,
        CompressionType::Rfc1951,
    ] {
        let files = collect_files(&[src.path().to_path_buf()], Some(src.path()), false, compression).unwrap();
        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("data.rpak");
        let summary = build_archive(&files, &archive_path).unwrap();
        assert_eq!(summary.files, 4);

        let archive = ResourceArchive::open(&archive_path).unwrap();
        let dest = out.path().join("unpacked");
        assert_eq!(archive.extract_all(&dest).unwrap(), 4);
        for file in &files {
            let original = fs::read(&file.absolute_path).unwrap();
            let restored = fs::read(dest.join(&file.relative_path)).unwrap();
            assert_eq!(original, restored, "{} with {compression}", file.relative_path);
        }
    }
}

#[test]
fn table_order_matches_sorted_names() {
    let src = tempfile::tempdir().unwrap();
    let names = ["b.txt", "a/z.txt", "a.txt", "C.txt", "a/b.txt"];
    let files: Vec<ArchiveSource> = names
        .iter()
        .map(|n| ArchiveSource::new(*n, write(src.path(), n, &text(n)), CompressionType::High))
        .collect();
    let archive_path = src.path().join("out.rpak");
    build_archive(&files, &archive_path).unwrap();

    let archive = ResourceArchive::open(&archive_path).unwrap();
    let listed: Vec<String> = archive.list().into_iter().map(|e| e.name).collect();
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(listed, expected);

    for name in &names {
        assert_eq!(archive.load_file(name).unwrap(), text(name));
    }
    assert!(matches!(archive.load_file("missing"), Err(ArchiveError::FileNotFound(_))));
}

#[test]
fn payload_offsets_are_contiguous_and_absolute() {
    let src = tempfile::tempdir().unwrap();
    let files: Vec<ArchiveSource> = ["one", "two", "three"]
        .iter()
        .map(|n| ArchiveSource::new(*n, write(src.path(), n, &text(n)), CompressionType::Fast))
        .collect();
    let archive_path = src.path().join("out.rpak");
    let summary = build_archive(&files, &archive_path).unwrap();

    let archive = ResourceArchive::open(&archive_path).unwrap();
    let header = *archive.header();
    let bytes = fs::read(&archive_path).unwrap();
    let mut expected_start = header.start_packed_files as usize;
    let table = &bytes[header.start_file_table as usize..header.start_packed_files as usize];
    for chunk in table.chunks_exact(16) {
        let start = u32::from_le_bytes(chunk[0..4].try_into().unwrap()) as usize;
        let size = u32::from_le_bytes(chunk[4..8].try_into().unwrap()) as usize;
        assert_eq!(start, expected_start);
        expected_start += size;
    }
    assert_eq!(expected_start, bytes.len());
    assert_eq!(summary.archive_bytes, bytes.len() as u64);
}

#[test]
fn incompressible_data_is_stored_raw() {
    let src = tempfile::tempdir().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let noise: Vec<u8> = (0..64 * 1024).map(|_| rng.gen()).collect();
    let files = vec![
        ArchiveSource::new("noise.bin", write(src.path(), "noise.bin", &noise), CompressionType::High),
        ArchiveSource::new("text.txt", write(src.path(), "text.txt", &text("t")), CompressionType::High),
    ];
    let archive_path = src.path().join("out.rpak");
    let summary = build_archive(&files, &archive_path).unwrap();
    assert_eq!(summary.raw_fallbacks, 1);

    let archive = ResourceArchive::open(&archive_path).unwrap();
    let entries = archive.list();
    let noise_entry = entries.iter().find(|e| e.name == "noise.bin").unwrap();
    assert_eq!(noise_entry.compression, CompressionType::None);
    assert_eq!(noise_entry.compressed_size, noise_entry.original_size);
    let text_entry = entries.iter().find(|e| e.name == "text.txt").unwrap();
    assert_eq!(text_entry.compression, CompressionType::High);
    assert!(text_entry.compressed_size < text_entry.original_size);
    assert_eq!(archive.load_file("noise.bin").unwrap(), noise);
}

#[test]
fn zero_byte_files_take_no_payload() {
    let src = tempfile::tempdir().unwrap();
    let files = vec![
        ArchiveSource::new("a.empty", write(src.path(), "a.empty", b""), CompressionType::High),
        ArchiveSource::new("b.empty", write(src.path(), "b.empty", b""), CompressionType::Fast),
    ];
    let archive_path = src.path().join("out.rpak");
    build_archive(&files, &archive_path).unwrap();

    let archive = ResourceArchive::open(&archive_path).unwrap();
    let header = *archive.header();
    assert_eq!(fs::metadata(&archive_path).unwrap().len(), u64::from(header.start_packed_files));
    for entry in archive.list() {
        assert_eq!(entry.original_size, 0);
        assert_eq!(entry.compressed_size, 0);
    }
    assert!(archive.load_file("a.empty").unwrap().is_empty());
}

#[test]
fn corrupt_archives_are_rejected() {
    let src = tempfile::tempdir().unwrap();
    let files = vec![ArchiveSource::new("a.txt", write(src.path(), "a.txt", &text("a")), CompressionType::Fast)];
    let archive_path = src.path().join("out.rpak");
    build_archive(&files, &archive_path).unwrap();
    let good = fs::read(&archive_path).unwrap();

    let mut bad_magic = good.clone();
    bad_magic[0] = b'X';
    fs::write(&archive_path, &bad_magic).unwrap();
    assert!(matches!(ResourceArchive::open(&archive_path), Err(ArchiveError::InvalidArchive { .. })));

    let truncated = &good[..good.len() - 1];
    fs::write(&archive_path, truncated).unwrap();
    assert!(matches!(ResourceArchive::open(&archive_path), Err(ArchiveError::InvalidArchive { .. })));
}

#[test]
fn rebuilding_replaces_the_previous_archive() {
    let src = tempfile::tempdir().unwrap();
    let path = write(src.path(), "a.txt", &text("first"));
    let files = vec![ArchiveSource::new("a.txt", &path, CompressionType::Fast)];
    let archive_path = src.path().join("out.rpak");
    build_archive(&files, &archive_path).unwrap();

    fs::write(&path, text("second")).unwrap();
    build_archive(&files, &archive_path).unwrap();
    let archive = ResourceArchive::open(&archive_path).unwrap();
    assert_eq!(archive.load_file("a.txt").unwrap(), text("second"));
}
