// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::config::{FileConfig, GeneralConfig, OutputFormat, TranslationConfig};
use crate::diagnostics;
use anyhow::{anyhow, Context};
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use colored::Colorize;
use itertools::Itertools;
use log::info;
use model_to_ir::{translate_program, TranslationOptions};
use program_model::{analyze, InterfaceDecls, SourceProgram, TranslationError};
use std::path::Path;
use verification_ir::{render_program, Program};

/// An unsupported or invalid program, kept together with its source for reporting
#[derive(Debug)]
pub struct Failure {
    pub program: SourceProgram,
    pub error: TranslationError,
}

pub fn load_program(path: &Path) -> anyhow::Result<SourceProgram> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SourceProgram::from_json(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Built-in declarations merged with the optional user interface file
pub fn load_interface(path: Option<&Path>) -> anyhow::Result<InterfaceDecls> {
    let mut decls = InterfaceDecls::builtins().context("parsing built-in interface")?;
    if let Some(path) = path {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let user = InterfaceDecls::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
        decls.merge(user);
    }
    Ok(decls)
}

/// Run the whole pipeline on an already loaded program
pub fn translate(
    program: SourceProgram,
    interface: &InterfaceDecls,
    options: &TranslationOptions,
) -> Result<Program, Failure> {
    let translated = analyze(&program, interface).and_then(|model| {
        info!(
            "analyzed {} classes and {} members",
            model.classes.len(),
            model.methods.len()
        );
        translate_program(&model, options)
    });
    translated.map_err(|error| Failure { program, error })
}

pub fn summary(program: &Program) -> String {
    program
        .declarations()
        .map(|decl| format!("{} {}", decl_kind(program, decl.name()), decl.name()))
        .join("\n")
}

fn decl_kind(program: &Program, name: &str) -> &'static str {
    if program.domains.contains_key(name) {
        "domain"
    } else if program.fields.contains_key(name) {
        "field"
    } else if program.functions.contains_key(name) {
        "function"
    } else if program.predicates.contains_key(name) {
        "predicate"
    } else {
        "method"
    }
}

pub fn render(program: &Program, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_program(program),
        OutputFormat::Summary => summary(program),
    }
}

/// Print a translation error, annotated with source text when it is available
fn report(program: &SourceProgram, err: &TranslationError) -> anyhow::Result<()> {
    let mut writer = StandardStream::stderr(ColorChoice::Auto);
    if !diagnostics::emit(&mut writer, program, err)? {
        let location = err.pos().map(|pos| format!("{}: ", pos)).unwrap_or_default();
        eprintln!("{}", format!("{}{}", location, err).bold().red());
    }
    Ok(())
}

pub fn execute(program_path: &Path, general: &GeneralConfig, translation: &TranslationConfig) -> anyhow::Result<()> {
    let file_config = FileConfig::load(general.config.as_deref(), program_path)?;
    let options = translation.options(&file_config);
    let interface = load_interface(translation.interface_path(&file_config).as_deref())?;
    let program = load_program(program_path)?;
    info!("translating {}", program_path.display());

    let translated = match translate(program, &interface, &options) {
        Ok(translated) => translated,
        Err(Failure { program, error }) => {
            report(&program, &error)?;
            return Err(anyhow!("translation failed ({})", error.code()));
        }
    };
    info!("emitted {} declarations", translated.len());

    let output = render(&translated, general.format);
    match &general.output {
        Some(path) => std::fs::write(path, output).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", output),
    }
    Ok(())
}
