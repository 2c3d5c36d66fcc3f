#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for the `info` command.
//!
//! `info` fetches every manifest object from the surface and prints what it
//! finds; it must never change the state it reads.

mod common;

use winstate_cli::commands::{apply, info};

const ZONE_STATE: &str = r#"{"objects":[{"identity":{"kind":"dns_zone","name":"corp.example.com"},"attrs":{"type":"forwarder","dns_servers":["10.0.0.1"]},"unknown":["replication"]}]}"#;

fn run_info(ctx: &common::IntegrationTestContext, extra: &[&str], trailing: &[&str]) -> anyhow::Result<String> {
    let (global, opts) = ctx.info_cli(extra, trailing);
    let mut out = Vec::new();
    info::run(&global, &opts, &common::logger(), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

/// Present objects list their attributes; missing ones are reported absent.
#[test]
fn reports_present_and_absent_objects() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    ctx.write_state(ZONE_STATE);

    let text = run_info(&ctx, &[], &[]).unwrap();
    assert!(text.contains("dns_zone corp.example.com: present"), "{text}");
    assert!(text.contains("  type         forwarder"), "{text}");
    assert!(text.contains("  not reported: replication"), "{text}");
    assert!(text.contains("package Git.Git: absent"), "{text}");
    assert!(text.contains("dhcp_scope 192.168.100.0: absent"), "{text}");
}

/// Reading never writes the state file back.
#[test]
fn info_leaves_state_untouched() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    ctx.write_state(ZONE_STATE);
    run_info(&ctx, &[], &[]).unwrap();
    assert_eq!(std::fs::read_to_string(ctx.state_path()).unwrap(), ZONE_STATE);
}

/// After an apply every manifest object shows up as present.
#[test]
fn applied_objects_are_present() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    let (global, opts) = ctx.cli("apply", &[]);
    apply::run(&global, &opts, false, &common::logger()).unwrap();

    let text = run_info(&ctx, &[], &[]).unwrap();
    assert_eq!(text.matches(": present").count(), 4, "{text}");
    assert!(!text.contains(": absent"), "{text}");
}

// ---------------------------------------------------------------------------
// Filtering and JSON
// ---------------------------------------------------------------------------

/// `--kind` limits the output to one object kind.
#[test]
fn kind_filter_limits_output() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    let text = run_info(&ctx, &[], &["--kind", "package"]).unwrap();
    assert_eq!(text.trim_end(), "package Git.Git: absent");
}

/// An unknown `--kind` is an error before anything is read.
#[test]
fn unknown_kind_fails() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    let err = run_info(&ctx, &[], &["--kind", "printer"]).unwrap_err();
    assert!(format!("{err:#}").contains("printer"), "{err:#}");
}

/// `--json` prints one tagged entry per object in manifest order.
#[test]
fn json_output_is_tagged_per_object() {
    let ctx = common::IntegrationTestContext::with_manifest(common::SITE_MANIFEST);
    ctx.write_state(ZONE_STATE);

    let text = run_info(&ctx, &["--json"], &[]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["status"], "present");
    assert_eq!(entries[0]["identity"]["kind"], "dns_zone");
    assert_eq!(entries[0]["attrs"]["dns_servers"][0], "10.0.0.1");
    assert_eq!(entries[0]["unknown"][0], "replication");
    assert!(entries[1..].iter().all(|e| e["status"] == "absent"));
}
