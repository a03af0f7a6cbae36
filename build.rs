// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: assembly configuration path
fn config_arg() -> Arg {
    Arg::new("config")
        .value_name("CONFIG")
        .default_value("jarforge.toml")
        .help("Assembly configuration")
}

fn build_cli() -> Command {
    Command::new("jarforge")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Jarforge Contributors")
        .about("Assemble a single conflict-free Java archive from resolved modules")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More log output (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only log warnings and errors"),
        )
        .subcommand(
            Command::new("assemble")
                .about("Assemble the output archive")
                .arg(config_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .help("Output archive (overrides artifact.output)"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_name("PATH")
                        .help("Also write the assembly report as JSON"),
                )
                .arg(
                    Arg::new("no_progress")
                        .long("no-progress")
                        .action(ArgAction::SetTrue)
                        .help("Disable the progress bar"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Classify, relocate and merge without writing, then show the result")
                .arg(config_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["text", "json"])
                        .default_value("text")
                        .help("Output format"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the contents of an archive")
                .arg(Arg::new("jar").required(true).help("Archive to inspect"))
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .action(ArgAction::SetTrue)
                        .help("Print the manifest"),
                )
                .arg(
                    Arg::new("entries")
                        .long("entries")
                        .action(ArgAction::SetTrue)
                        .help("List every entry"),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Write a starter jarforge.toml")
                .arg(Arg::new("dir").default_value(".").help("Project directory"))
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Artifact name (defaults to the directory name)"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing configuration"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("jarforge.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
