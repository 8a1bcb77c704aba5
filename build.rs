//! This build script copies the `memory.x` file from the crate root into
//! a directory where the linker can always find it at build time, and adds
//! the RP2040 link arguments when we are building for the Pico.
//!
//! Host builds (for `cargo test`) only get the version file.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
	// Put `memory.x` in our output directory and ensure it's
	// on the linker search path.
	let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
	File::create(out.join("memory.x"))
		.unwrap()
		.write_all(include_bytes!("memory.x"))
		.unwrap();
	println!("cargo:rustc-link-search={}", out.display());

	// By default, Cargo will re-run a build script whenever
	// any file in the project changes. By specifying `memory.x`
	// here, we ensure the build script is only re-run when
	// `memory.x` is changed.
	println!("cargo:rerun-if-changed=memory.x");
	println!("cargo:rerun-if-changed=build.rs");

	// Only the Cortex-M0+ binary wants the cortex-m-rt and defmt linker
	// scripts.
	let target = env::var("TARGET").unwrap_or_default();
	if target.starts_with("thumbv6m") {
		println!("cargo:rustc-link-arg-bins=--nmagic");
		println!("cargo:rustc-link-arg-bins=-Tlink.x");
		println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
	}

	// Generate a file containing the firmware version. Outside of a git
	// checkout we fall back to the package version.
	let mut output = String::from(env!("CARGO_PKG_VERSION")).into_bytes();
	if let Ok(version_output) = std::process::Command::new("git")
		.current_dir(env::var_os("CARGO_MANIFEST_DIR").unwrap())
		.args(["describe", "--tags", "--dirty"])
		.output()
	{
		if version_output.status.success() {
			output = version_output.stdout;
			// Remove the trailing newline
			output.pop();
		}
	}

	// Write the file
	std::fs::write(out.join("version.txt"), output).expect("writing version file");
}
