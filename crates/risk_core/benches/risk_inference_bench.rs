use criterion::{black_box, criterion_group, criterion_main, Criterion};
use credit_risk_core::{BackendKind, FormInput, RiskConfig, RiskService};
use std::path::PathBuf;

fn sample_service(backend: BackendKind) -> RiskService {
    let mut config = RiskConfig::default();
    config.model.path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/credit_default_v1.json");
    config.model.backend = backend;
    let service = RiskService::from_config(&config).expect("valid config");
    service.warm_up().expect("shipped model loads");
    service
}

fn bench_predict(c: &mut Criterion) {
    let partial = FormInput::default().to_partial().expect("default form is valid");

    for backend in [BackendKind::Classifier, BackendKind::Booster] {
        let service = sample_service(backend);
        c.bench_function(&format!("predict_{backend}"), |b| {
            b.iter(|| black_box(service.predict(black_box(&partial))));
        });
    }
}

fn bench_assess(c: &mut Criterion) {
    let service = sample_service(BackendKind::Classifier);
    let partial = FormInput::default().to_partial().expect("default form is valid");

    c.bench_function("assess_with_explanation", |b| {
        b.iter(|| black_box(service.assess(black_box(&partial))));
    });
}

criterion_group!(risk_benches, bench_predict, bench_assess);
criterion_main!(risk_benches);
