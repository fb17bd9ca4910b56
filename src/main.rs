use classgen::jvm::Version;
use classgen::*;

use clap::builder::PossibleValuesParser;
use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process;

fn main() -> Result<(), translate::Error> {
    env_logger::init();

    let matches = Command::new("classgen")
        .version(crate_version!())
        .about("Generate class files for the built-in demo compilation units")
        .arg(
            Arg::new("target")
                .long("target")
                .value_name("RELEASE")
                .value_parser(|release: &str| {
                    Version::from_release(release).ok_or_else(|| format!("unsupported release `{}`", release))
                })
                .help("Class file version to generate (eg. `1.4`, `6`, `8`) [default: 7]"),
        )
        .arg(
            Arg::new("debug")
                .short('g')
                .long("debug")
                .value_name("KIND")
                .value_parser(["lines", "vars", "source", "none"])
                .action(ArgAction::Append)
                .help("Debug information to emit (by default `lines` and `source`)"),
        )
        .arg(
            Arg::new("jsr limit")
                .long("jsr-limit")
                .value_name("COMPLEXITY")
                .value_parser(value_parser!(i32))
                .help("Finalizer complexity above which `jsr` subroutines are used [default: 50]"),
        )
        .arg(
            Arg::new("fat code")
                .long("fat-code")
                .action(ArgAction::SetTrue)
                .help("Use 4-byte jump offsets from the start"),
        )
        .arg(
            Arg::new("output dir")
                .short('d')
                .long("output-dir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Directory under which class files are written"),
        )
        .arg(
            Arg::new("DEMO")
                .num_args(1..)
                .required(true)
                .value_parser(PossibleValuesParser::new(demo::DEMOS.iter().copied()))
                .help("Demo compilation units to compile"),
        )
        .get_matches();

    let mut settings = translate::Settings::default();
    if let Some(target) = matches.get_one::<Version>("target") {
        settings.target = *target;
    }
    if let Some(kinds) = matches.get_many::<String>("debug") {
        settings.line_debug_info = false;
        settings.var_debug_info = false;
        settings.source_file_debug_info = false;
        for kind in kinds {
            match kind.as_str() {
                "lines" => settings.line_debug_info = true,
                "vars" => settings.var_debug_info = true,
                "source" => settings.source_file_debug_info = true,
                _ => (),
            }
        }
    }
    if let Some(limit) = matches.get_one::<i32>("jsr limit") {
        settings.jsr_limit = *limit;
    }
    settings.fat_code = matches.get_flag("fat code");
    let output_dir = matches
        .get_one::<PathBuf>("output dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    log::debug!("settings: {:?}", settings);

    let mut failed = false;
    for name in matches.get_many::<String>("DEMO").into_iter().flatten() {
        let demo = match demo::build(name) {
            Some(demo) => demo,
            None => continue,
        };
        log::info!("Compiling demo '{}'", name);
        let mut session = translate::Session::new(demo.graph, demo.java, settings.clone());
        session.compile_to(demo.unit, &output_dir)?;
        if !session.diagnostics().is_empty() {
            eprintln!("{}", session.diagnostics());
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
    Ok(())
}
