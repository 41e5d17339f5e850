// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deterministic child process for exercising pipelines.
//!
//! Sleeps, writes the requested text to stdout and stderr, optionally dumps
//! its environment, copies stdin to the selected streams (or discards it)
//! and exits with the requested code.

use clap::Parser;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::time::Duration;

/// Exit status when the probe itself fails
const PROBE_FAILURE: u8 = 128;

#[derive(Parser, Debug)]
#[command(name = "pipewright-probe")]
struct ProbeArgs {
    #[arg(long, default_value_t = 0, help = "Exit code to report")]
    exit: u8,

    #[arg(long, default_value = "", help = "Text written to stdout")]
    stdout: String,

    #[arg(long, default_value = "", help = "Text written to stderr")]
    stderr: String,

    #[arg(long, help = "Copy stdin to stdout")]
    stdin2out: bool,

    #[arg(long, help = "Copy stdin to stderr")]
    stdin2err: bool,

    #[arg(long, default_value_t = 0, help = "Milliseconds to sleep before doing anything")]
    sleep_ms: u64,

    #[arg(
        long,
        default_value = "",
        value_name = "STREAM",
        help = "Print the environment to 'stdout' or 'stderr'; other values print nothing"
    )]
    printenv: String,
}

fn main() -> ExitCode {
    let args = ProbeArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::from(args.exit),
        Err(error) => {
            let _ = writeln!(io::stderr(), "error: {}", error);
            ExitCode::from(PROBE_FAILURE)
        }
    }
}

fn run(args: &ProbeArgs) -> io::Result<()> {
    if args.sleep_ms > 0 {
        std::thread::sleep(Duration::from_millis(args.sleep_ms));
    }

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    stdout.write_all(args.stdout.as_bytes())?;
    stdout.flush()?;
    stderr.write_all(args.stderr.as_bytes())?;
    stderr.flush()?;

    let env_target: Option<&mut dyn Write> = match args.printenv.as_str() {
        "stdout" => Some(&mut stdout),
        "stderr" => Some(&mut stderr),
        _ => None,
    };
    if let Some(out) = env_target {
        for (key, value) in std::env::vars_os() {
            writeln!(out, "{}={}", key.to_string_lossy(), value.to_string_lossy())?;
        }
        out.flush()?;
    }

    let mut stdin = io::stdin().lock();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match stdin.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if args.stdin2out {
            stdout.write_all(&chunk[..n])?;
            stdout.flush()?;
        }
        if args.stdin2err {
            stderr.write_all(&chunk[..n])?;
            stderr.flush()?;
        }
    }
    Ok(())
}
