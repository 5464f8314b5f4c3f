//! End-to-end tests: graph + platform + allocation -> derived records ->
//! JSON documents on disk.

use std::fs;

use serde_json::Value;

use nocflow::derive::{RateAdjustment, TargetList};
use nocflow::emit::{injector_file_name, pe_file_name, PLATFORM_FILE};
use nocflow::{
    create_default_registry, write_all, AllocationMap, CommGraph, FixedSeeds, FlowError,
    GenerationConfig, Platform, RandomSeeds, RunSummary, Structure, ThreadRef,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    graph: CommGraph,
    platform: Platform,
    threads: [ThreadRef; 4],
}

/// 2x2 mesh at 25 MHz (period 4) with a 3-slot bus at (1, 0).
///
/// - `a -> b` at 128 Mbps: rate exactly 100%
/// - `b -> c` at 1 Mbps: rate rounds to 0% and is raised to 1%
/// - `c -> a` at 1000 Mbps: rate 781% capped to 100%
/// - `d` has no targets
fn fixture() -> Fixture {
    let mut graph = CommGraph::new();
    let app = graph.add_application("demo");
    let a = graph.add_thread(app, Some("a")).unwrap();
    let b = graph.add_thread(app, Some("b")).unwrap();
    let c = graph.add_thread(app, Some("c")).unwrap();
    let d = graph.add_thread(app, Some("d")).unwrap();
    graph.add_target(a, b, 128.0).unwrap();
    graph.add_target(b, c, 1.0).unwrap();
    graph.add_target(c, a, 1000.0).unwrap();

    let mut platform = Platform::new(2, 2, 25).unwrap();
    platform.embed(Structure::bus(3).unwrap(), (1, 0)).unwrap();

    let allocation = AllocationMap::new().with(0, a).with(5, b).with(2, c).with(3, d);
    platform.install_allocation(&graph, allocation).unwrap();

    Fixture {
        graph,
        platform,
        threads: [a, b, c, d],
    }
}

fn read_json(path: std::path::PathBuf) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ============================================================================
// Derivation
// ============================================================================

#[test]
fn test_rates_and_adjustments() {
    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut FixedSeeds(5)).unwrap();

    assert_eq!(tables.len(), 6);
    assert_eq!(f.platform.clock_period(), 4);

    let inj = &tables.injectors;
    assert_eq!((inj[0].injection_rate, inj[0].adjustment), (100, RateAdjustment::None));
    assert_eq!((inj[5].injection_rate, inj[5].adjustment), (1, RateAdjustment::RaisedToMinimum));
    assert_eq!(
        (inj[2].injection_rate, inj[2].adjustment),
        (100, RateAdjustment::CappedAtMaximum { computed: 781 })
    );
    assert_eq!(inj[3].injection_rate, 0);
    assert!(inj[3].targets.is_idle());
    assert_eq!(tables.adjusted().count(), 2);

    // Unallocated slots.
    for address in [1, 4] {
        assert_eq!(inj[address].injection_rate, 0);
        assert_eq!(inj[address].targets, TargetList::Idle);
        assert!(!tables.endpoints[address].binding.is_bound());
    }

    // Every rate stays within 0..=100.
    assert!(inj.iter().all(|i| i.injection_rate <= 100));
}

#[test]
fn test_targets_resolve_to_addresses() {
    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut FixedSeeds(5)).unwrap();

    match &tables.injectors[0].targets {
        TargetList::Active(flows) => {
            assert_eq!(flows.len(), 1);
            assert_eq!(flows[0].address, 5);
            assert_eq!(flows[0].messages_in_burst, 128.0);
            assert_eq!(flows[0].payload_size, 126);
        }
        TargetList::Idle => panic!("thread a has outgoing traffic"),
    }
    assert_eq!(tables.endpoints[5].binding.thread(), Some(f.threads[1]));
}

#[test]
fn test_unbound_destination_is_fatal() {
    let mut f = fixture();
    let [a, b, c, _] = f.threads;
    f.platform
        .install_allocation(&f.graph, AllocationMap::new().with(0, a).with(5, b).with(2, c))
        .unwrap();
    f.platform.derive(&f.graph, &mut FixedSeeds(0)).unwrap();

    f.platform
        .install_allocation(&f.graph, AllocationMap::new().with(0, a))
        .unwrap();
    let err = f.platform.derive(&f.graph, &mut FixedSeeds(0)).unwrap_err();
    assert!(matches!(err, FlowError::UnresolvedTarget { .. }));
}

#[test]
fn test_seeds_in_range() {
    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut RandomSeeds::seeded(42)).unwrap();
    for injector in &tables.injectors {
        assert!(injector.seeds.0 <= 2_147_483_646);
        assert!(injector.seeds.1 <= 2_147_483_646);
    }

    let again = f.platform.derive(&f.graph, &mut RandomSeeds::seeded(42)).unwrap();
    assert_eq!(tables.injectors, again.injectors);
}

// ============================================================================
// Emission
// ============================================================================

#[test]
fn test_write_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut FixedSeeds(9)).unwrap();

    let report = write_all(dir.path(), &f.platform, &tables).unwrap();
    assert_eq!(report.files_written, 13);
    for address in 0..6 {
        assert!(dir.path().join(pe_file_name(address)).exists());
        assert!(dir.path().join(injector_file_name(address)).exists());
    }

    let pe1 = read_json(dir.path().join(pe_file_name(1)));
    assert_eq!(pe1["AppID"], 99);
    assert_eq!(pe1["ThreadID"], 99);
    assert_eq!(pe1["InjectorClockPeriod"], 4);

    let pe5 = read_json(dir.path().join(pe_file_name(5)));
    assert_eq!(pe5["AppID"], 0);
    assert_eq!(pe5["ThreadID"], 1);
    assert_eq!(pe5["PEPos"], 5);

    let inj0 = read_json(dir.path().join(injector_file_name(0)));
    assert_eq!(inj0["InjectionRate"], 100);
    assert_eq!(inj0["TargetPEs"], serde_json::json!([5]));
    assert_eq!(inj0["AmountOfMessagesInBurst"], serde_json::json!([128]));
    assert_eq!(inj0["SourcePEs"], serde_json::json!([0]));
    assert_eq!(inj0["Headers"]["Header5"], serde_json::json!(["ADDR", "SIZE"]));
    assert_eq!(inj0["RNGSeed1"], 9);
    assert_eq!(inj0["timestampFlag"], 1_984_626_850u64);

    let inj3 = read_json(dir.path().join(injector_file_name(3)));
    assert_eq!(inj3["TargetPEs"], serde_json::json!([99]));
    assert_eq!(inj3["InjectionRate"], 0);
}

#[test]
fn test_platform_document() {
    let dir = tempfile::tempdir().unwrap();
    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut FixedSeeds(0)).unwrap();
    write_all(dir.path(), &f.platform, &tables).unwrap();

    let text = fs::read_to_string(dir.path().join(PLATFORM_FILE)).unwrap();
    assert!(text.starts_with("{\n    \"AmountOfBuses\": 1,"));

    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["AmountOfPEs"], 6);
    assert_eq!(doc["AmountOfPEsInBuses"], serde_json::json!([3]));
    assert_eq!(doc["AmountOfPEsInCrossbars"], serde_json::json!([]));
    assert_eq!(doc["BaseNoCDimensions"], serde_json::json!([2, 2]));
    assert_eq!(doc["ReferenceClock"], 25);
    assert_eq!(doc["SquareNoCBound"], 3);
    assert_eq!(doc["WrapperAddresses"], serde_json::json!([0, 1, 2, 3, 1, 1]));
}

#[test]
fn test_fixed_seeds_are_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let f = fixture();

    for dir in [&first, &second] {
        let tables = f.platform.derive(&f.graph, &mut FixedSeeds(1234)).unwrap();
        write_all(dir.path(), &f.platform, &tables).unwrap();
    }

    for name in (0..6)
        .flat_map(|a| [pe_file_name(a), injector_file_name(a)])
        .chain([PLATFORM_FILE.to_string()])
    {
        let a = fs::read(first.path().join(&name)).unwrap();
        let b = fs::read(second.path().join(&name)).unwrap();
        assert_eq!(a, b, "{} differs", name);
    }
}

#[test]
fn test_unwritable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("taken");
    fs::write(&blocker, "not a directory").unwrap();

    let f = fixture();
    let tables = f.platform.derive(&f.graph, &mut FixedSeeds(0)).unwrap();
    let err = write_all(blocker.join("out"), &f.platform, &tables).unwrap_err();
    assert!(matches!(err, FlowError::OutputDirectory { .. }));
}

// ============================================================================
// Configuration-driven runs
// ============================================================================

const H16_25_PIP: &str = r#"
platform:
  width: 3
  height: 3
  reference_clock_mhz: 10
  structures:
    - kind: Crossbar
      endpoints: 7
      cell: [2, 0]
    - kind: Bus
      endpoints: 6
      cell: [2, 1]
    - kind: Bus
      endpoints: 6
      cell: [2, 2]

applications:
  - preset: PIP

allocation:
  strategy: sequential

output:
  name: H16_25 PIP
"#;

#[test]
fn test_config_to_files() {
    let config = GenerationConfig::from_yaml(H16_25_PIP).unwrap();
    let composition = config.build(&create_default_registry()).unwrap();
    let platform = &composition.platform;

    assert_eq!(platform.total_endpoints(), 25);
    assert_eq!(platform.clock_period(), 10);

    let tables = platform.derive(&composition.graph, &mut FixedSeeds(3)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let report = write_all(dir.path(), platform, &tables).unwrap();
    assert_eq!(report.files_written, 51);

    // PIP threads occupy addresses 0..8; InpMemA (128 + 64 Mbps) is at 0.
    let inj0 = read_json(dir.path().join(injector_file_name(0)));
    assert_eq!(inj0["InjectionRate"], 60);
    assert_eq!(inj0["TargetPEs"], serde_json::json!([1, 4]));

    let inj8 = read_json(dir.path().join(injector_file_name(8)));
    assert_eq!(inj8["AppID"], 99);

    let summary = RunSummary::new(&config.output.name, platform, &composition.graph);
    let path = summary.write_to_dir(dir.path()).unwrap();
    assert!(path.ends_with("H16_25 PIPInfo.txt"));
    // The report sits beside the documents it describes.
    assert_eq!(path.parent(), Some(dir.path()));
    assert!(dir.path().join(PLATFORM_FILE).exists());
    assert_eq!(summary.setup.pes_per_bus, vec![6, 6]);
    assert_eq!(summary.application.targets, 8);
}
