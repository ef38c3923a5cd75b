// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: target adapter
fn adapter_arg(required: bool) -> Arg {
    Arg::new("adapter")
        .short('a')
        .long("adapter")
        .value_name("ID")
        .required(required)
        .help("Adapter id")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print output as JSON")
}

fn named(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("name").required(true).help("Repository name"))
        .arg(adapter_arg(true))
}

fn build_cli() -> Command {
    Command::new("aeris")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Aeris Contributors")
        .about("One front-end for many package managers")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Path to the configuration file (also AERIS_CONFIG)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only print errors"),
        )
        .arg(
            Arg::new("system")
                .long("system")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Operate on system packages (elevates with pkexec, sudo or doas)"),
        )
        .subcommand(
            Command::new("search")
                .about("Search for packages in every enabled adapter")
                .arg(Arg::new("query").required(true).help("Search query"))
                .arg(adapter_arg(false).action(ArgAction::Append))
                .arg(Arg::new("limit").short('l').long("limit").help("Maximum results per adapter"))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show details for a package")
                .arg(Arg::new("package").required(true).help("Package as adapter:package-id"))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages")
                .arg(Arg::new("packages").required(true).num_args(1..).help("adapter:name or plain names"))
                .arg(adapter_arg(false)),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(Arg::new("packages").required(true).num_args(1..).help("adapter:name or plain names"))
                .arg(adapter_arg(false)),
        )
        .subcommand(
            Command::new("update")
                .about("Update packages (everything when no package is given)")
                .arg(Arg::new("packages").num_args(0..).help("adapter:name or plain names"))
                .arg(adapter_arg(false)),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(adapter_arg(false))
                .arg(json_arg()),
        )
        .subcommand(Command::new("updates").about("List available updates").arg(json_arg()))
        .subcommand(
            Command::new("sync")
                .about("Refresh repository metadata")
                .arg(adapter_arg(false)),
        )
        .subcommand(
            Command::new("run")
                .about("Run a package without installing it")
                .arg(Arg::new("package").required(true).help("Package as adapter:package-id"))
                .arg(Arg::new("args").last(true).num_args(0..).help("Arguments passed to the package")),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Summary of adapters, installed packages and pending updates"),
        )
        .subcommand(
            Command::new("repo")
                .about("Repository management")
                .subcommand(Command::new("list").about("List repositories").arg(adapter_arg(true)))
                .subcommand(
                    named("add", "Add a repository")
                        .arg(Arg::new("url").required(true).help("Repository URL")),
                )
                .subcommand(named("remove", "Remove a repository"))
                .subcommand(named("enable", "Enable a repository"))
                .subcommand(named("disable", "Disable a repository")),
        )
        .subcommand(
            Command::new("profile")
                .about("Profile management")
                .subcommand(Command::new("list").about("List profiles").arg(adapter_arg(true)))
                .subcommand(
                    Command::new("switch")
                        .about("Make a profile active")
                        .arg(Arg::new("profile").required(true).help("Profile id"))
                        .arg(adapter_arg(true)),
                ),
        )
        .subcommand(
            Command::new("adapter")
                .about("Adapter management")
                .subcommand(Command::new("list").about("List registered adapters").arg(json_arg()))
                .subcommand(Command::new("info").about("Show an adapter").arg(Arg::new("id").required(true)))
                .subcommand(Command::new("enable").about("Enable an adapter").arg(Arg::new("id").required(true)))
                .subcommand(Command::new("disable").about("Disable an adapter").arg(Arg::new("id").required(true)))
                .subcommand(Command::new("health").about("Check adapter health").arg(Arg::new("id"))),
        )
        .subcommand(
            Command::new("config")
                .about("Adapter settings")
                .subcommand(Command::new("show").about("Show settings").arg(Arg::new("adapter")))
                .subcommand(
                    Command::new("get")
                        .about("Print a setting")
                        .arg(Arg::new("adapter").required(true))
                        .arg(Arg::new("key").required(true)),
                )
                .subcommand(
                    Command::new("set")
                        .about("Change a setting")
                        .arg(Arg::new("adapter").required(true))
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(
                    Command::new("unset")
                        .about("Remove a setting")
                        .arg(Arg::new("adapter").required(true))
                        .arg(Arg::new("key").required(true)),
                ),
        )
        .subcommand(
            Command::new("plugin")
                .about("Plugin management")
                .subcommand(Command::new("available").about("List plugins offered by the registry"))
                .subcommand(
                    Command::new("install")
                        .about("Install a plugin from the registry")
                        .arg(Arg::new("id").required(true))
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .action(ArgAction::SetTrue)
                                .help("Reinstall even if the same version is present"),
                        ),
                )
                .subcommand(Command::new("remove").about("Remove a plugin").arg(Arg::new("id").required(true)))
                .subcommand(Command::new("list").about("List plugins on this machine")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
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

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("aeris.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
