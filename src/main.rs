//! Parallel Memory Bandwidth CLI
//!
//! Runs one kernel invocation per hardware thread, every spawned worker
//! pinned to its own logical core, and reports the summed bandwidth.
//!
//! # Usage
//!
//! `cachebench <kernel-code>`
//!
//! | Code | Kernel |
//! |------|--------|
//! | 0 | sequential strided read |
//!
//! # Output Format
//!
//! Each participant prints `<bytes_per_sec> B/s` as it finishes (order is
//! not deterministic), then one summary line:
//! `Total bandwidth: <bytes_per_sec> B/s, <gb_per_sec> GB/s`
//!
//! # Exit Codes
//!
//! - `0`: Success
//! - `1`: Wrong argument count, or a worker could not be pinned
//! - abnormal termination: unparseable or unknown kernel code

use std::process::ExitCode;

use cachebench::{run, HarnessConfig, Kernel, RunError};

fn print_usage(exe: &str) {
    eprintln!("usage: {exe} <kernel-code>\n\nKERNELS:");
    for kernel in Kernel::ALL {
        eprintln!("    {}    {}", kernel.code(), kernel.name());
    }
}

/// Kernel selection failures are programming or registry errors, not
/// recoverable input: terminate abnormally.
fn select_kernel(arg: &str) -> Kernel {
    let Ok(code) = arg.trim().parse::<i64>() else {
        eprintln!("invalid kernel code: '{arg}'");
        std::process::abort();
    };
    match Kernel::from_code(code) {
        Some(kernel) => kernel,
        None => {
            eprintln!("unknown kernel code: {code}");
            std::process::abort();
        }
    }
}

fn main() -> ExitCode {
    let mut args = std::env::args();
    let exe = args.next().unwrap_or_else(|| "cachebench".into());
    let args: Vec<String> = args.collect();

    let [arg] = args.as_slice() else {
        print_usage(&exe);
        return ExitCode::from(1);
    };

    let kernel = select_kernel(arg);
    let config = HarnessConfig::default();

    match run(&config, kernel) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err @ RunError::Affinity { .. }) => {
            match err.raw_os_error() {
                Some(code) => println!("Returned {code}"),
                None => println!("Returned {err}"),
            }
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}
