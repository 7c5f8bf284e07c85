use std::path::PathBuf;
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, fs};

use hoptrace_core::rpc::{BitcoinRpc, HttpRpcClient, RpcClientConfig};
use hoptrace_core::sink::Destination;
use hoptrace_core::trace::trace;
use hoptrace_core::{Cache, FlaggedAddress, ResolvedTransaction, TraceOptions};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hoptrace_core=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

fn output_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time must be after unix epoch")
        .as_nanos();
    let dir = env::temp_dir().join(format!("hoptrace-itest-{nanos}"));
    fs::create_dir_all(&dir).expect("output dir must be creatable");
    dir
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a regtest node with -addressindex and a funded address"]
async fn regtest_trace_writes_seed_and_hop_files() {
    init_tracing();

    let rpc_url = env::var("HOPTRACE_TEST_RPC_URL").expect("HOPTRACE_TEST_RPC_URL must be set");
    let rpc_user = env::var("HOPTRACE_TEST_RPC_USER").expect("HOPTRACE_TEST_RPC_USER must be set");
    let rpc_pass = env::var("HOPTRACE_TEST_RPC_PASS").expect("HOPTRACE_TEST_RPC_PASS must be set");
    let address = env::var("HOPTRACE_TEST_ADDRESS").expect("HOPTRACE_TEST_ADDRESS must be set");

    let mut config = RpcClientConfig::new(rpc_url.clone());
    config.user = Some(rpc_user);
    config.pass = Some(rpc_pass);
    let rpc = HttpRpcClient::new(config).expect("rpc client must construct");

    eprintln!("[itest] checking get_blockchain_info against {rpc_url}");
    let info = rpc
        .get_blockchain_info()
        .await
        .expect("regtest get_blockchain_info must succeed");
    assert_eq!(info.chain, "regtest");

    let txids = rpc
        .list_transaction_ids(&address)
        .await
        .expect("getaddresstxids must succeed; is -addressindex enabled?");
    assert!(!txids.is_empty(), "fixture address must have history");

    let dir = output_dir();
    let seed = FlaggedAddress {
        address: address.clone(),
        report_type: "itest".into(),
    };
    let report = trace(&rpc, &Cache::new(), &dir, &seed, &TraceOptions::default())
        .await
        .expect("trace must succeed");
    eprintln!(
        "[itest] seed records={} skipped={} hop={:?}",
        report.seed_records,
        report.seed_skipped,
        report.hop.as_ref().map(|hop| &hop.address)
    );

    assert!(report.seed_records > 0, "fixture address must produce records");
    assert_eq!(report.seed_skipped, 0, "no transaction should fail on regtest");

    let seed_file = dir.join(Destination::seed("itest", &address).file_name());
    let content = fs::read_to_string(&seed_file).expect("seed output must exist");
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some(ResolvedTransaction::FIELD_NAMES.join(",").as_str())
    );
    assert_eq!(lines.count(), report.seed_records);

    let hop = report.hop.expect("last record must yield a hop");
    if hop.records > 0 {
        let hop_file = dir.join(Destination::hop("itest", &address, &hop.address).file_name());
        assert!(hop_file.exists(), "hop output must exist");
    }

    let _ = fs::remove_dir_all(dir);
}
