use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use log::info;
use opsbridge_devkit::{single_host, FactDocumentBuilder, RunnerHarness, StubEngine};
use opsbridge_runner::{
    FactNormalizer, FleetRunner, HardwareFactNormalizer, MqttLiveChannel, OutputBinding,
    RunnerConfig, Workload,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("🚀 opsbridge integration pass starting");

    live_module_pass().await?;
    background_playbook_pass().await?;
    failure_and_cancel_pass().await?;
    normalization_pass()?;
    broker_pass().await?;

    info!("🎉 all integration passes completed");
    Ok(())
}

/// Module run streamed line by line to a live channel
async fn live_module_pass() -> Result<()> {
    info!("▶️ pass 1: live module run");
    let harness = RunnerHarness::new(StubEngine::with_stdout_lines(&[
        "10.0.0.1 | CHANGED | rc=0 >>",
        "root",
    ]));
    let mut config = RunnerConfig::default();
    config.forks = Some(4);
    config.ssh.common_args = Some("-o StrictHostKeyChecking=no".to_string());

    harness
        .live_runner("conv-demo")
        .with_config(config)
        .run_module(&single_host("10.0.0.1"), "shell", "whoami")
        .await;

    harness.expect_streamed(&["10.0.0.1 | CHANGED | rc=0 >>", "root"])?;
    let request = harness
        .last_request()
        .context("engine never saw the module request")?;
    ensure!(request.data_dir_existed, "scratch dir missing during run");
    ensure!(request.request.forks == Some(4), "forks knob not forwarded");
    ensure!(
        request.request.ssh_args.common == vec!["-o", "StrictHostKeyChecking=no"],
        "ssh args not split into argv"
    );
    info!("✅ streamed {} line(s) live", harness.streamed_texts().len());
    Ok(())
}

/// Playbook run recorded under a background job id
async fn background_playbook_pass() -> Result<()> {
    info!("▶️ pass 2: background playbook run");
    let plays = std::env::temp_dir().join("opsbridge-integration-plays");
    fs::create_dir_all(&plays)?;
    fs::write(plays.join("site.yml"), "- hosts: all\n  tasks: []\n")?;

    let harness = RunnerHarness::new(StubEngine::with_stdout_lines(&[
        "PLAY [all] *****",
        "changed: [10.0.0.1]",
    ]));
    let mut extra_vars = serde_json::Map::new();
    extra_vars.insert("app_version".to_string(), json!("2.4.1"));

    let ok = harness
        .background_runner("job-17")
        .run_playbook(
            &single_host("10.0.0.1"),
            &plays.join("site.yml"),
            Some(extra_vars),
        )
        .await;

    ensure!(ok, "playbook run reported failure");
    harness.expect_stored("job-17", &["PLAY [all] *****", "changed: [10.0.0.1]"])?;
    let request = harness
        .last_request()
        .context("engine never saw the playbook request")?;
    ensure!(
        request.request.private_data_dir == plays,
        "playbook parent dir not used as working dir"
    );
    ensure!(
        matches!(&request.request.workload, Workload::Playbook { file } if file == "site.yml"),
        "playbook file name not forwarded"
    );
    ensure!(
        request.request.extra_vars.is_some(),
        "extra vars not forwarded"
    );
    info!("✅ job record holds {} row(s)", harness.stored_texts("job-17").len());
    Ok(())
}

/// Startup faults land in the job record; cancellation stops output
async fn failure_and_cancel_pass() -> Result<()> {
    info!("▶️ pass 3: failure reporting and cancellation");
    let harness = RunnerHarness::new(StubEngine::new().fail_startup("ansible-runner not installed"));

    let ok = harness
        .background_runner("job-18")
        .run_playbook(&single_host("10.0.0.1"), Path::new("/srv/plays/site.yml"), None)
        .await;

    ensure!(!ok, "startup fault should report failure");
    let stored = harness.stored_texts("job-18");
    ensure!(
        stored.len() == 1 && stored[0].contains("ansible-runner not installed"),
        "fault text missing from job record"
    );

    let harness = RunnerHarness::new(StubEngine::with_stdout_lines(&["never delivered"]));
    let canceled = Arc::new(AtomicBool::new(true));
    let probe = canceled.clone();
    harness
        .live_runner("conv-cancel")
        .with_cancel_check(move || probe.load(Ordering::SeqCst))
        .run_module(&single_host("10.0.0.1"), "shell", "sleep 600")
        .await;

    harness.expect_streamed(&[])?;
    info!("✅ faults reported, canceled run stayed silent");
    Ok(())
}

/// Raw fact documents through both normalizers
fn normalization_pass() -> Result<()> {
    info!("▶️ pass 4: fact normalization");
    let document = FactDocumentBuilder::new()
        .success_host("192.168.122.37")
        .success_host_with(
            "192.168.122.40",
            json!({
                "ansible_facts": {
                    "ansible_hostname": "db-1",
                    "ansible_mem_detailed_info": {"MemTotal": "16322096 kB"},
                    "ansible_disk_detailed_info": {"vda": {"size": "100G"}}
                }
            }),
        )
        .failed_host("192.168.122.41", "Missing sudo password")
        .unreachable_host("192.168.122.42")
        .build();

    let records = FactNormalizer::normalize(&document)?;
    ensure!(records.len() == 3, "expected 3 records, got {}", records.len());
    for record in &records {
        info!(
            "🧾 {} status={} cpu={:?} disk={:?}",
            record.ip,
            record.status.code(),
            record.cpu,
            record.disk_total
        );
    }

    let hardware = HardwareFactNormalizer::normalize(&document)?;
    ensure!(hardware.len() == 2, "expected 2 hardware rows");
    ensure!(
        hardware.iter().any(|r| r.mem_info.is_some()),
        "detailed memory block lost"
    );

    println!("{}", serde_json::to_string_pretty(&records)?);
    info!("✅ normalized {} host(s), {} hardware row(s)", records.len(), hardware.len());
    Ok(())
}

/// Optional: stream a short run over a real broker.
/// Set OPSBRIDGE_DEMO_BROKER=host:port to enable.
async fn broker_pass() -> Result<()> {
    let Ok(broker) = std::env::var("OPSBRIDGE_DEMO_BROKER") else {
        info!("⏭️ pass 5: no OPSBRIDGE_DEMO_BROKER set, skipping broker leg");
        return Ok(());
    };
    let (host, port) = broker
        .split_once(':')
        .context("OPSBRIDGE_DEMO_BROKER must be host:port")?;
    let port: u16 = port.parse().context("broker port is not a number")?;

    info!("▶️ pass 5: streaming over broker {}:{}", host, port);
    let channel = MqttLiveChannel::connect(host, port, "opsbridge-integration");
    let engine = StubEngine::with_stdout_lines(&["broker round trip"]);
    let runner = FleetRunner::new(
        Arc::new(engine),
        OutputBinding::live(Arc::new(channel), "conv-broker"),
    );

    runner
        .run_module(&single_host("10.0.0.1"), "ping", "")
        .await;
    // give the client loop a moment to flush the publish
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    info!("✅ broker leg done, check the output topic for the frame");
    Ok(())
}
