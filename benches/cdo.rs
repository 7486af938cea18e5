use cdo::{write_dataset, ClassicFile, CommandLine, Dataset, NcType, OperatorChain, Variable};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};

fn bench_command_line(c: &mut Criterion) {
    let chain = OperatorChain::new("fldmean")
        .then("sellonlatbox,0,30,40,60")
        .then("selname,T,P");
    let inputs = vec!["era5 2020.nc".to_string()];
    let outputs = vec![PathBuf::from("/tmp/out.nc")];
    let options = vec!["-f".to_string(), "nc4".to_string()];

    c.bench_function("assemble_command_line", |b| {
        b.iter(|| {
            CommandLine::assemble(
                black_box(Path::new("/usr/bin/cdo")),
                &options,
                &chain,
                &inputs,
                &outputs,
            )
            .map(|line| line.render())
        })
    });
}

fn bench_classic_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.nc");
    let values: Vec<f64> = (0..180 * 360).map(|i| i as f64 * 0.5).collect();
    let data = ArrayD::from_shape_vec(IxDyn(&[180, 360]), values).unwrap();
    let dataset = Dataset::new()
        .with_dimension("lat", 180)
        .with_dimension("lon", 360)
        .with_variable(Variable::new("T", &["lat", "lon"], NcType::Float, data));
    write_dataset(&dataset, &path).unwrap();

    c.bench_function("read_classic_variable", |b| {
        b.iter(|| {
            let file = ClassicFile::open(black_box(&path)).unwrap();
            file.read_variable("T").unwrap()
        })
    });
}

criterion_group!(benches, bench_command_line, bench_classic_read);
criterion_main!(benches);
