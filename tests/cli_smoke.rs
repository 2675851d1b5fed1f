use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn dropclick(home: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("dropclick")?;
    // keep any user policy file out of the run
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn stdout_json(output: &std::process::Output) -> Result<Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn config_set_persists_between_invocations() -> Result<()> {
    let tmp = tempdir()?;
    let store = tmp.path().join("agent.json");

    let shown = dropclick(tmp.path())?
        .arg("--store")
        .arg(&store)
        .args(["--output", "json", "config", "show"])
        .assert()
        .success();
    let config = stdout_json(shown.get_output())?;
    assert_eq!(config["autoClickerEnabled"], Value::Bool(false));
    assert_eq!(config["clickDelay"], Value::from(50));

    dropclick(tmp.path())?
        .arg("--store")
        .arg(&store)
        .args(["config", "set", "clickDelay", "0"])
        .assert()
        .success();
    dropclick(tmp.path())?
        .arg("--store")
        .arg(&store)
        .args(["config", "set", "enabled", "on"])
        .assert()
        .success();

    let got = dropclick(tmp.path())?
        .arg("--store")
        .arg(&store)
        .args(["config", "get", "clickDelay"])
        .assert()
        .success();
    assert_eq!(String::from_utf8_lossy(&got.get_output().stdout).trim(), "0");

    let persisted: Value = serde_json::from_slice(&std::fs::read(&store)?)?;
    assert_eq!(persisted["clickDelay"], Value::from(0));
    assert_eq!(persisted["autoClickerEnabled"], Value::Bool(true));
    Ok(())
}

#[test]
fn unknown_setting_is_rejected() -> Result<()> {
    let tmp = tempdir()?;
    dropclick(tmp.path())?
        .arg("--store")
        .arg(tmp.path().join("agent.json"))
        .args(["config", "set", "volume", "11"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn demo_buys_once_the_drop_goes_live() -> Result<()> {
    let tmp = tempdir()?;
    let run = dropclick(tmp.path())?
        .arg("--store")
        .arg(tmp.path().join("agent.json"))
        .args([
            "--output",
            "json",
            "demo",
            "--lead",
            "1s",
            "--live",
            "--checkout-lag",
            "100ms",
            "--duration",
            "20s",
        ])
        .assert()
        .success();
    let report = stdout_json(run.get_output())?;

    assert_eq!(report["status"]["state"], Value::from("done"));
    assert_eq!(report["status"]["checkouts"], Value::from(1));
    let clicks = report["clicks"].as_array().cloned().unwrap_or_default();
    let targets: Vec<&str> = clicks
        .iter()
        .filter_map(|click| click["target"].as_str())
        .collect();
    assert_eq!(targets.first(), Some(&"buy"));
    assert_eq!(targets.last(), Some(&"checkout"));
    assert!(clicks[0]["offset_ms"].as_i64().unwrap_or(-1) >= 0);
    Ok(())
}
