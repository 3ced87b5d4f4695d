use credit_risk_core::gbdt::sigmoid;
use credit_risk_core::reconcile;
use credit_risk_core::{
    BackendKind, DefaultTable, FeatureSchema, FormInput, PartialInput, RiskConfig, RiskService,
    RiskThresholds, RiskTier,
};
use proptest::prelude::*;
use std::path::PathBuf;

fn service(backend: BackendKind) -> RiskService {
    let mut config = RiskConfig::default();
    config.model.path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/credit_default_v1.json");
    config.model.backend = backend;
    RiskService::from_config(&config).unwrap()
}

fn form_input() -> impl Strategy<Value = FormInput> {
    (
        10_000.0..=1_000_000.0f64,
        18.0..=80.0f64,
        -2i32..=4,
        0.0..=1_000_000.0f64,
        0.0..=500_000.0f64,
    )
        .prop_map(|(limit_bal, age, pay_0, bill_amt1, pay_amt1)| FormInput {
            limit_bal,
            age,
            pay_0,
            bill_amt1,
            pay_amt1,
        })
}

proptest! {
    #[test]
    fn probability_is_bounded_and_tier_consistent(form in form_input()) {
        let svc = service(BackendKind::Classifier);
        let result = svc.predict(&form.to_partial().unwrap()).unwrap();

        prop_assert!((0.0..=1.0).contains(&result.probability));
        let expected = if result.probability > 0.5 {
            RiskTier::High
        } else if result.probability > 0.3 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        };
        prop_assert_eq!(result.tier, expected);
    }

    #[test]
    fn attributions_reconstruct_the_prediction(form in form_input()) {
        let svc = service(BackendKind::Classifier);
        let assessment = svc.assess(&form.to_partial().unwrap()).unwrap();
        let attribution = assessment.explanation.unwrap();

        prop_assert!((sigmoid(attribution.total()) - assessment.prediction.probability).abs() < 1e-9);
    }

    #[test]
    fn backends_agree(form in form_input()) {
        let partial = form.to_partial().unwrap();
        let a = service(BackendKind::Classifier).predict(&partial).unwrap();
        let b = service(BackendKind::Booster).predict(&partial).unwrap();
        prop_assert!((a.probability - b.probability).abs() < 1e-12);
    }

    #[test]
    fn tiers_are_monotone_in_probability(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        let t = RiskThresholds::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(t.classify(lo) <= t.classify(hi));
    }

    #[test]
    fn reconcile_prefers_supplied_values(
        supplied in prop::collection::btree_map(
            prop::sample::select(vec!["LIMIT_BAL", "AGE", "PAY_0", "BILL_AMT1", "PAY_AMT1"]),
            -1.0e6..1.0e6f64,
            0..=5,
        )
    ) {
        let schema = FeatureSchema::credit_default();
        let defaults = DefaultTable::credit_default();
        let partial: PartialInput = supplied.iter().map(|(k, v)| (*k, *v)).collect();
        let vector = reconcile(&schema, &partial, &defaults).unwrap();

        prop_assert_eq!(vector.len(), 23);
        for name in schema.names() {
            let expected = supplied
                .get(name.as_str())
                .copied()
                .or_else(|| defaults.get(name));
            prop_assert_eq!(vector.get(name), expected);
        }
    }
}
