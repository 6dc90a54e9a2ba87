// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::*;
use colored::Colorize;
use contract_translator::config::{GeneralConfig, TranslationConfig};
use contract_translator::translate::execute;
use simplelog::{Config, LevelFilter, WriteLogger};
use tracing::debug;

#[derive(Parser)]
#[clap(
    name = env!("CARGO_BIN_NAME"),
    about = "Translates a parsed, contract-annotated program into the verification IR",
    rename_all = "kebab-case",
    author,
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Args {
    /// Program file (JSON syntax tree and type table)
    pub program: PathBuf,

    /// General options
    #[clap(flatten)]
    pub general_config: GeneralConfig,

    /// Translation options
    #[clap(flatten)]
    pub translation_config: TranslationConfig,
}

fn main() {
    #[cfg(windows)]
    let _ = colored::control::set_virtual_terminal(true);

    let args = Args::parse();
    let level = if args.general_config.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    let _ = WriteLogger::init(level, Config::default(), std::io::stderr());

    debug!("Contract-Translator CLI version: {}", env!("CARGO_PKG_VERSION"));

    let result = execute(&args.program, &args.general_config, &args.translation_config);

    match result {
        Ok(_) => (),
        Err(err) => {
            let err = format!("{:?}", err);
            println!("{}", err.bold().red());
            std::process::exit(1);
        }
    }
}
