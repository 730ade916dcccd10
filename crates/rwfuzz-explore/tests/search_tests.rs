use proptest::prelude::*;
use rwfuzz_explore::pairing::pool::FuncPairSeedsPool;
use rwfuzz_explore::pairing::similarity::{max_similarity, similarity, CONFLICT_THRESHOLD};
use rwfuzz_explore::search::{CollectingSink, MutationScheduler, SchedulerConfig};
use rwfuzz_explore::seeding::confirm::{ConfirmConfig, TypeConfirmer};
use rwfuzz_explore::seeding::mutate::Mutator;
use rwfuzz_explore::seeding::rng::{STAGE_MUTATION, STAGE_SEEDING};
use rwfuzz_explore::seeding::seed::SeedGenerator;
use rwfuzz_ir::{CandidateTypeSet, ContractInfo, FuncSeed, FunctionDescriptor, FunctionInput, Value};
use rwfuzz_ledger::{find_arg, KeyValuePair, MockCall, MockLedger};

fn text(args: &[KeyValuePair], key: &str) -> String {
    String::from_utf8_lossy(find_arg(args, key).unwrap_or_default()).into_owned()
}

/// `credit` writes the account it is given and rejects numeric names;
/// `audit` reads the account it is given.
fn bank_ledger() -> MockLedger {
    MockLedger::new()
        .on("credit", |args| {
            let to = text(args, "to");
            if to.parse::<i64>().is_ok() {
                MockCall::fail("account must be a name")
            } else {
                MockCall::ok(Vec::<String>::new(), [format!("acct#{}", to)])
            }
        })
        .on("audit", |args| {
            MockCall::ok([format!("acct#{}", text(args, "who"))], Vec::<String>::new())
        })
}

fn bank_contract() -> ContractInfo {
    let mut info = ContractInfo::new("bank");
    info.add_function(FunctionDescriptor::new("credit", vec!["to".into()]));
    info.add_function(FunctionDescriptor::new("audit", vec!["who".into()]));
    info.params.insert(
        "to".into(),
        CandidateTypeSet::new([Value::int(0), Value::string("a")]),
    );
    info.params
        .insert("who".into(), CandidateTypeSet::new([Value::string("b")]));
    info
}

#[test]
fn test_pipeline_finds_and_validates_conflict() {
    let ledger = bank_ledger();
    let mut info = bank_contract();

    let report = TypeConfirmer::new(&ledger, ConfirmConfig::default()).confirm_all(&mut info);
    assert_eq!(report.searched, vec!["credit".to_string()]);
    assert_eq!(info.params["to"].accepted, vec![Value::string("a")]);
    assert_eq!(info.params["who"].accepted, vec![Value::string("b")]);

    let seeds = SeedGenerator::new(&ledger, Mutator::from_seed(11, STAGE_SEEDING)).generate(&info);
    assert_eq!(seeds.len(), 2);

    let mut pool = FuncPairSeedsPool::build(&seeds);
    assert_eq!(pool.conflict_len(), 0);
    assert_eq!(pool.mutate_len(), 1);

    let mut sink = CollectingSink::default();
    let stats = MutationScheduler::new(
        &ledger,
        &info,
        Mutator::from_seed(11, STAGE_MUTATION),
        SchedulerConfig::default(),
    )
    .run(&mut pool, &mut sink);

    assert!(pool.is_empty());
    assert_eq!(stats.promoted, 1);
    assert_eq!(stats.validated, 1);
    assert_eq!(stats.rounds, 2);
    assert_eq!(sink.validated.len(), 1);

    let pair = &sink.validated[0];
    assert_eq!(pair.function_names(), ("audit", "credit"));
    assert!(pair.max_similarity > CONFLICT_THRESHOLD);
    assert_eq!(pair.seed_one.read_set, pair.seed_two.write_set);
}

#[test]
fn test_round_limit_leaves_work_queued() {
    let ledger = bank_ledger();
    let mut info = bank_contract();
    TypeConfirmer::new(&ledger, ConfirmConfig::default()).confirm_all(&mut info);
    let seeds = SeedGenerator::new(&ledger, Mutator::from_seed(5, STAGE_SEEDING)).generate(&info);
    let mut pool = FuncPairSeedsPool::build(&seeds);

    let config = SchedulerConfig {
        iteration_budget: 1,
        threshold: 2.0,
        max_rounds: Some(3),
    };
    let mutator = Mutator::from_seed(5, STAGE_MUTATION);
    let stats = MutationScheduler::new(&ledger, &info, mutator, config)
        .run(&mut pool, &mut CollectingSink::default());

    assert_eq!(stats.rounds, 3);
    assert_eq!(stats.requeued, 3);
    assert_eq!(pool.mutate_len(), 1);
}

#[test]
fn test_pool_snapshot_preserves_order() {
    let ledger = bank_ledger();
    let mut info = bank_contract();
    TypeConfirmer::new(&ledger, ConfirmConfig::default()).confirm_all(&mut info);
    let seeds = SeedGenerator::new(&ledger, Mutator::from_seed(2, STAGE_SEEDING)).generate(&info);
    let pool = FuncPairSeedsPool::build(&seeds);

    let dir = tempfile::tempdir().unwrap();
    let path = pool.save_to_dir(dir.path(), "bank").unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("func_pair_seeds_pool_bank_"));
    assert!(name.ends_with(".json"));

    let restored = FuncPairSeedsPool::load(&path).unwrap();
    assert_eq!(restored, pool);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["conflict_seeds"].is_array());
    assert!(raw["mutate_seeds"].is_array());
}

fn keyed(reads: Vec<String>, writes: Vec<String>) -> FuncSeed {
    let mut seed = FuncSeed::new("f", FunctionInput::new());
    seed.read_set = reads;
    seed.write_set = writes;
    seed
}

proptest! {
    #[test]
    fn test_similarity_symmetric_and_bounded(a in "[a-z#0-9]{0,12}", b in "[a-z#0-9]{0,12}") {
        let ab = similarity(&a, &b);
        prop_assert!((ab - similarity(&b, &a)).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert_eq!(similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_max_similarity_symmetric(
        r1 in prop::collection::vec("[a-z]{1,6}", 0..4),
        w1 in prop::collection::vec("[a-z]{1,6}", 0..4),
        r2 in prop::collection::vec("[a-z]{1,6}", 0..4),
        w2 in prop::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        let one = keyed(r1, w1);
        let two = keyed(r2, w2);
        prop_assert_eq!(max_similarity(&one, &two), max_similarity(&two, &one));
    }

    #[test]
    fn test_mutation_always_differs(s in "[a-zA-Z0-9]{0,8}", seed in any::<u64>()) {
        let mut mutator = Mutator::from_seed(seed, STAGE_MUTATION);
        let original = Value::string(s);
        prop_assert_ne!(mutator.different_value(&original), original);
    }
}
