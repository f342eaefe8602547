//! The clap bridge: realizing a `ParserSpec` as a `clap::Command` and
//! folding `ArgMatches` back into the flat value map the calling engine
//! consumes.
//!
//! Defaults are deliberately not registered with clap; only values the user
//! actually typed land in the map, and the engine substitutes defaults
//! itself. This keeps all-or-nothing group accounting honest.

use std::collections::BTreeMap;

use clap::builder::PossibleValuesParser;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use declargs_compiler::instantiator::Instantiator;
use declargs_compiler::parser::{ArgKind, ParserSpec};
use declargs_compiler::strings;
use declargs_compiler::types::{Nargs, Parsed};
use declargs_compiler::{DeclargsError, Result};

/// Build the clap command tree for one parser node.
pub fn build_command(name: &str, spec: &ParserSpec) -> Command {
    let mut command = Command::new(name.to_string());
    if let Some(description) = &spec.description {
        command = command.about(description.clone());
    }

    for def in &spec.args {
        match &def.lowered.kind {
            // Fixed fields never touch the command line.
            ArgKind::Fixed => {}
            ArgKind::BoolFlagPair { .. } => {
                let negated = def.negated_path();
                command = command
                    .arg(
                        Arg::new(def.path.clone())
                            .long(strings::swap_delimiters(&def.path))
                            .action(ArgAction::SetTrue)
                            .overrides_with(negated.clone())
                            .help(def.lowered.help.clone().unwrap_or_default()),
                    )
                    .arg(
                        Arg::new(negated.clone())
                            .long(strings::swap_delimiters(&negated))
                            .action(ArgAction::SetTrue)
                            .overrides_with(def.path.clone())
                            .help(format!(
                                "Negation of --{}",
                                strings::swap_delimiters(&def.path)
                            )),
                    );
            }
            ArgKind::Value { instantiator } => {
                let mut arg = Arg::new(def.path.clone())
                    .value_name(def.lowered.metavar.clone())
                    .required(def.lowered.required)
                    .help(help_with_default(def.lowered.help.as_deref(), &def.lowered.default_tokens));

                if !def.field.is_positional() {
                    arg = arg.long(strings::swap_delimiters(&def.path));
                }
                // Fixed arities consume an exact token count, so leading
                // hyphens are unambiguous. Variable arities must stop at the
                // next flag; only negative number literals pass through.
                arg = match def.lowered.nargs {
                    Nargs::Fixed(n) => arg.num_args(n).allow_hyphen_values(true),
                    Nargs::Variable => arg.num_args(0..).allow_negative_numbers(true),
                };
                if matches!(instantiator, Instantiator::Append { .. }) {
                    arg = arg.action(ArgAction::Append);
                }
                if let Some(choices) = &def.lowered.choices {
                    arg = arg.value_parser(PossibleValuesParser::new(choices.clone()));
                }
                command = command.arg(arg);
            }
        }
    }

    for group in spec.subcommands.values() {
        command = command.subcommand_required(group.required);
        for option in &group.options {
            let mut sub = build_command(&option.name, &option.spec);
            if let Some(help) = &group.help {
                if sub.get_about().is_none() {
                    sub = sub.about(help.clone());
                }
            }
            command = command.subcommand(sub);
        }
    }

    command
}

fn help_with_default(help: Option<&str>, default_tokens: &Option<Vec<String>>) -> String {
    let rendered = default_tokens.as_ref().map(|tokens| {
        tokens
            .iter()
            .map(|t| strings::shell_quote(t))
            .collect::<Vec<_>>()
            .join(" ")
    });
    match (help, rendered) {
        (Some(help), Some(default)) => format!("{} (default: {})", help, default),
        (Some(help), None) => help.to_string(),
        (None, Some(default)) => format!("(default: {})", default),
        (None, None) => String::new(),
    }
}

/// Fold matches into the flat value map, inserting only user-supplied
/// values, keyed by absolute dotted path.
pub fn extract(
    spec: &ParserSpec,
    matches: &ArgMatches,
    prefix: &str,
    out: &mut BTreeMap<String, Parsed>,
) -> Result<()> {
    for def in &spec.args {
        let key = strings::make_field_name(&[prefix, &def.path]);
        match &def.lowered.kind {
            ArgKind::Fixed => {}
            ArgKind::BoolFlagPair { .. } => {
                let negated = def.negated_path();
                if matches.value_source(&def.path) == Some(ValueSource::CommandLine)
                    && matches.get_flag(&def.path)
                {
                    out.insert(key, Parsed::Flag(true));
                } else if matches.value_source(&negated) == Some(ValueSource::CommandLine)
                    && matches.get_flag(&negated)
                {
                    out.insert(key, Parsed::Flag(false));
                }
            }
            ArgKind::Value { instantiator } => {
                if matches.value_source(&def.path) != Some(ValueSource::CommandLine) {
                    continue;
                }
                if matches!(instantiator, Instantiator::Append { .. }) {
                    let groups: Vec<Vec<String>> = matches
                        .get_occurrences::<String>(&def.path)
                        .map(|occurrences| {
                            occurrences
                                .map(|group| group.cloned().collect())
                                .collect()
                        })
                        .unwrap_or_default();
                    out.insert(key, Parsed::Occurrences(groups));
                } else {
                    let tokens: Vec<String> = matches
                        .get_many::<String>(&def.path)
                        .map(|values| values.cloned().collect())
                        .unwrap_or_default();
                    out.insert(key, Parsed::Tokens(tokens));
                }
            }
        }
    }

    if let Some((name, sub_matches)) = matches.subcommand() {
        let group = spec
            .subcommands
            .values()
            .next()
            .ok_or_else(|| DeclargsError::Binding {
                flag: name.to_string(),
                msg:  "unexpected subcommand".to_string(),
            })?;
        let option = group.option(name).ok_or_else(|| DeclargsError::Binding {
            flag: name.to_string(),
            msg:  "unknown subcommand".to_string(),
        })?;

        let group_prefix = strings::make_field_name(&[prefix, &group.path]);
        out.insert(
            strings::subcommand_dest(&group_prefix),
            Parsed::Tokens(vec![name.to_string()]),
        );
        extract(&option.spec, sub_matches, &group_prefix, out)?;
    }

    Ok(())
}
