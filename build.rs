use anyhow::Result;
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<()> {
    // Generate git information
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Add build timestamp
    let now = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .and_then(|secs| chrono::Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(chrono::Utc::now);

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let tcsync_version = get_tcsync_version_from_metadata().unwrap_or_else(|_| {
        read_tcsync_version_fallback().unwrap_or_else(|_| "unknown".to_string())
    });
    println!("cargo:rustc-env=TCSYNC_VERSION={tcsync_version}");

    println!("cargo:rerun-if-changed=tcsync/Cargo.toml");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    Ok(())
}

/// Get the tcsync library version from cargo metadata (local or published dependency)
fn get_tcsync_version_from_metadata() -> Result<String> {
    let output = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    // Workspace member first
    let member = metadata["packages"].as_array().and_then(|packages| {
        packages
            .iter()
            .find(|package| package["name"].as_str() == Some("tcsync"))
            .and_then(|package| package["version"].as_str())
    });
    if let Some(version) = member {
        return Ok(version.to_string());
    }

    // Then the resolved graph, ids look like "tcsync 0.3.0 (registry+...)"
    let resolved = metadata["resolve"]["nodes"].as_array().and_then(|nodes| {
        nodes
            .iter()
            .filter_map(|node| node["id"].as_str())
            .find_map(|id| id.strip_prefix("tcsync ")?.split(' ').next())
    });
    if let Some(version) = resolved {
        return Ok(version.to_string());
    }

    anyhow::bail!("tcsync package not found in metadata");
}

/// Fallback: read the version line of tcsync/Cargo.toml
fn read_tcsync_version_fallback() -> Result<String> {
    let toml_content = fs::read_to_string("tcsync/Cargo.toml")?;

    for line in toml_content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("version") {
            if let Some(value) = rest.trim_start().strip_prefix('=') {
                return Ok(value.trim().trim_matches('"').trim_matches('\'').to_string());
            }
        }
    }

    anyhow::bail!("Could not find version in tcsync/Cargo.toml");
}
