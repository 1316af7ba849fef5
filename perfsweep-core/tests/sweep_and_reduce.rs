use std::num::NonZeroU32;
use std::path::Path;

use perfsweep_core::reduce;
use perfsweep_core::runner::{ClientOptions, ClusterOptions};
use perfsweep_core::{OpsTarget, RunOptions, Sweep, SweepSpace};
use perfsweep_test::runner::RecordingRunner;

fn sweep(output_root: &Path) -> Sweep {
    let space = SweepSpace {
        servers: vec![1, 4],
        replicas: vec![1],
        tests: vec!["get".into(), "set".into()],
        clients: [1, 2, 3, 8]
            .map(|c| NonZeroU32::new(c).unwrap())
            .to_vec(),
        ..Default::default()
    };
    let options = RunOptions {
        cluster: ClusterOptions::default(),
        client: ClientOptions::default(),
        ops: OpsTarget::Total(800),
        output_root: output_root.to_owned(),
    };
    Sweep::new(space, options).unwrap()
}

#[tokio::test]
async fn sweep_then_reduce() {
    perfsweep_test::tracing::init();

    let root = tempfile::tempdir().unwrap();
    let sweep = sweep(root.path());
    let runner = RecordingRunner::new().with_results().fail_for(3);

    let report = sweep.run(&runner).await;

    // One server cannot hold a replica, so that whole shape is skipped.
    assert_eq!(report.skipped(), 8);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.completed(), 6);

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 8);
    let first = &invocations[0];
    assert_eq!(first.servers, 4);
    assert_eq!(first.client.test, "get");
    assert_eq!(first.client.requests, 800);
    let last = &invocations[7];
    assert_eq!(last.client.test, "set");
    assert_eq!((last.client_processes, last.client.threads), (2, 4));
    assert_eq!(last.client.requests, 100);

    let report = reduce::reduce(sweep.space(), root.path());

    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.clients == Some(3)));
    assert_eq!(report.tables.len(), 2);

    let dir = root.path().join("servers4_replicas1_span1_value3_keys1");
    for test in ["get", "set"] {
        let summary =
            std::fs::read_to_string(dir.join(format!("{test}_throughput_v_clients.dat"))).unwrap();
        assert_eq!(summary, "1    800.00\n2    800.00\n8    800.00\n");

        let cdf = std::fs::read_to_string(dir.join(format!("{test}_client8-all_reqLatencies.cdf")))
            .unwrap();
        assert_eq!(cdf.lines().count(), 104);
    }
    assert!(!dir.join("get_client3-all_throughput.dat").exists());
}

#[tokio::test]
async fn repeated_sweeps_reuse_directories() {
    let root = tempfile::tempdir().unwrap();
    let sweep = sweep(root.path());

    let first: Vec<_> = sweep.plan().filter_map(Result::ok).map(|c| c.output_dir).collect();
    sweep.run(&RecordingRunner::new()).await;
    sweep.run(&RecordingRunner::new()).await;
    let second: Vec<_> = sweep.plan().filter_map(Result::ok).map(|c| c.output_dir).collect();

    assert_eq!(first, second);
    let entries = std::fs::read_dir(root.path()).unwrap().count();
    assert_eq!(entries, 1);
}
