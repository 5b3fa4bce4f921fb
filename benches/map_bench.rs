use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filemap_io::{read_mapped, FileHandle};
use std::fs;
use std::path::PathBuf;

// Simple helper to build a unique temp path per bench
fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("filemap_io_bench_{}_{}", name, std::process::id()));
    p
}

const SIZES: [usize; 3] = [4 * 1024, 64 * 1024, 1024 * 1024];

fn seed(name: &str, size: usize) -> PathBuf {
    let path = tmp_path(name);
    fs::write(&path, vec![0xAB_u8; size]).expect("seed");
    path
}

fn bench_open_map_close(b: &mut Criterion) {
    let mut group = b.benchmark_group("open_map_close");
    for &size in &SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            let path = seed(&format!("open_map_close_{}", sz), sz);
            ben.iter(|| {
                let mut handle = FileHandle::open(&path).expect("open");
                let mut buffer = Some(handle.establish().expect("establish"));
                criterion::black_box(buffer.as_deref().map(|b| b[sz - 1]));
                handle.tear_down(&mut buffer).expect("tear down");
                handle.close().expect("close");
            });
            let _ = fs::remove_file(&path);
        });
    }
    group.finish();
}

fn bench_remap_same_handle(b: &mut Criterion) {
    let mut group = b.benchmark_group("remap_same_handle");
    for &size in &SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            let path = seed(&format!("remap_{}", sz), sz);
            let mut handle = FileHandle::open(&path).expect("open");
            ben.iter(|| {
                let mapping = handle.map().expect("map");
                criterion::black_box(mapping.len());
            });
            handle.close().expect("close");
            let _ = fs::remove_file(&path);
        });
    }
    group.finish();
}

fn bench_read_mapped_vs_fs_read(b: &mut Criterion) {
    let mut group = b.benchmark_group("read_whole_file");
    for &size in &SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let path = seed(&format!("read_whole_{}", size), size);
        group.bench_with_input(BenchmarkId::new("read_mapped", size), &path, |ben, p| {
            ben.iter(|| criterion::black_box(read_mapped(p).expect("read_mapped")));
        });
        group.bench_with_input(BenchmarkId::new("fs_read", size), &path, |ben, p| {
            ben.iter(|| criterion::black_box(fs::read(p).expect("fs::read")));
        });
        let _ = fs::remove_file(&path);
    }
    group.finish();
}

fn criterion_config() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_secs(3))
}

criterion_group! {
    name = map_benches;
    config = criterion_config();
    targets =
        bench_open_map_close,
        bench_remap_same_handle,
        bench_read_mapped_vs_fs_read
}

criterion_main!(map_benches);
