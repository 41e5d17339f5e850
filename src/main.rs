// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Build script for this repository, written with the library it builds.
//!
//! ```text
//! cargo run -- -help
//! cargo run -- test -- --nocapture
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pipewright::config::{combine_options, with_dir, with_stdout, with_stdout_json_decoder, JsonSlot, Settings};
use pipewright::engine::{Context, Pipeline, SharedBuffer};
use pipewright::makefile::{file_up_to_date, MakeTarget, Makefile};
use pipewright::observability::logger;
use pipewright::rebuild::{RebuildOutcome, Rebuilder};
use pipewright::template::{parse_text, write_file};
use pipewright::traits::recipe_fn;
use pipewright::utils::{copy_file, exists};

const MANIFEST_DIR: &str = env!("CARGO_MANIFEST_DIR");

const INSTALL_SCRIPT: &str = "#!/bin/sh
# pipewright {{version}}
set -e
install -m 0755 \"$(dirname \"$0\")/{{binary}}\" \"${PREFIX:-/usr/local}/bin/{{binary}}\"
";

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    version: String,
    targets: Vec<BuildTarget>,
}

#[derive(Debug, Deserialize)]
struct BuildTarget {
    name: String,
    kind: Vec<String>,
}

/// `cargo <args>` in the repository root, output on ours
async fn cargo(ctx: &Context, args: &[&str]) -> anyhow::Result<()> {
    let mut chain = Pipeline::exec_opt(
        ctx,
        combine_options(vec![
            with_dir(MANIFEST_DIR),
            with_stdout(tokio::io::stdout()),
        ]),
        "cargo",
        args.iter().copied(),
    );
    chain.run().await?;
    Ok(())
}

fn targets() -> Vec<MakeTarget> {
    vec![
        MakeTarget::new(
            "all",
            recipe_fn(|ctx, mf| {
                Box::pin(async move {
                    mf.depend(ctx, &["fmt", "check", "test"]).await?;
                    anyhow::Ok(())
                })
            }),
        )
        .desc("Format check, compile check and tests")
        .as_default(),
        MakeTarget::new(
            "check",
            recipe_fn(|ctx, _mf| Box::pin(cargo(ctx, &["check", "--all-targets"]))),
        )
        .desc("Compile every target without producing binaries"),
        MakeTarget::new(
            "test",
            recipe_fn(|ctx, mf| {
                Box::pin(async move {
                    let mut args = vec!["test"];
                    args.extend(mf.target_args().iter().map(String::as_str));
                    cargo(ctx, &args).await
                })
            }),
        )
        .desc("Run the test suite")
        .long_desc("Arguments after the target name are passed to cargo test."),
        MakeTarget::new(
            "fmt",
            recipe_fn(|ctx, _mf| Box::pin(cargo(ctx, &["fmt", "--", "--check"]))),
        )
        .desc("Verify formatting"),
        MakeTarget::new(
            "docs",
            recipe_fn(|ctx, _mf| Box::pin(cargo(ctx, &["doc", "--no-deps"]))),
        )
        .desc("Render the API documentation")
        .up_to_date(file_up_to_date(
            Path::new(MANIFEST_DIR).join("target/doc/pipewright/index.html"),
            [format!("{}/src/**/*.rs", MANIFEST_DIR)],
        )),
        MakeTarget::new("metadata", recipe_fn(|ctx, _mf| Box::pin(print_metadata(ctx))))
            .desc("List the package's build targets"),
        MakeTarget::new("lines", recipe_fn(|ctx, _mf| Box::pin(count_lines(ctx))))
            .desc("Count lines of Rust source")
            .hidden(),
        MakeTarget::new(
            "dist",
            recipe_fn(|ctx, _mf| {
                Box::pin(async move {
                    cargo(ctx, &["build", "--release", "--bin", "pipewright"]).await?;
                    stage_release_binary()
                })
            }),
        )
        .desc("Build the release binary and stage it with an install script in dist/"),
    ]
}

async fn print_metadata(ctx: &Context) -> anyhow::Result<()> {
    let slot = JsonSlot::<Metadata>::new();
    let mut chain = Pipeline::exec_opt(
        ctx,
        combine_options(vec![with_dir(MANIFEST_DIR), with_stdout_json_decoder(slot.clone())]),
        "cargo",
        ["metadata", "--format-version", "1", "--no-deps"],
    );
    chain.run().await?;

    let metadata = slot
        .take()
        .ok_or_else(|| anyhow::anyhow!("cargo metadata produced no document"))?;
    for package in &metadata.packages {
        println!("{} {}", package.name, package.version);
        for target in &package.targets {
            println!("  {:<20} {}", target.name, target.kind.join(","));
        }
    }
    Ok(())
}

async fn count_lines(ctx: &Context) -> anyhow::Result<()> {
    let total = SharedBuffer::new();
    let mut chain = Pipeline::exec_opt(ctx, with_dir(MANIFEST_DIR), "find", ["src", "tests", "-name", "*.rs"])
        .pipe_opt(with_dir(MANIFEST_DIR), "xargs", ["cat"])?
        .pipe_opt(with_stdout(total.clone()), "wc", ["-l"])?;
    chain.run().await?;
    println!("{} lines of Rust", total.to_string_lossy().trim());
    Ok(())
}

fn stage_release_binary() -> anyhow::Result<()> {
    let name = format!("pipewright{}", std::env::consts::EXE_SUFFIX);
    let built = Path::new(MANIFEST_DIR).join("target/release").join(&name);
    if !exists(&built) {
        anyhow::bail!("release build did not produce {}", built.display());
    }
    let dist: PathBuf = Path::new(MANIFEST_DIR).join("dist");
    std::fs::create_dir_all(&dist)?;
    copy_file(dist.join(&name), &built, Some(0o755))?;
    write_file(
        dist.join("install.sh"),
        Some(0o755),
        &parse_text(INSTALL_SCRIPT)?,
        &serde_json::json!({ "version": env!("CARGO_PKG_VERSION"), "binary": name }),
    )?;
    println!("staged {}", dist.join(&name).display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::from_env();
    logger::init(&settings);
    let ctx = Context::background();

    let rebuilder = Rebuilder::new("pipewright", settings).sources([
        format!("{}/src/**/*.rs", MANIFEST_DIR),
        format!("{}/Cargo.toml", MANIFEST_DIR),
    ]);
    match rebuilder.ensure_fresh(&ctx).await {
        Ok(RebuildOutcome::Continue) => {}
        Ok(RebuildOutcome::Delegated(code)) => return ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    Makefile::new(targets()).run_main(&ctx).await
}
