use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Workflows,
    Correct,
    Expand,
    Match,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "workflows" => CliVerb::Workflows,
        "correct" => CliVerb::Correct,
        "expand" => CliVerb::Expand,
        "match" => CliVerb::Match,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: router-supervisor [--settings <yaml>] [--log <file>] <command> ...".to_string(),
        "".to_string(),
        "Commands:".to_string(),
        "  workflows <dir>                                    List loaded and rejected workflows"
            .to_string(),
        "  correct <scene.json> <tool> [params-json]          Plan one call through the manual pipeline"
            .to_string(),
        "  expand <dir> <workflow> <scene.json> [--prompt TEXT] [--param k=v]..."
            .to_string(),
        "                                                     Expand a workflow into a corrected plan"
            .to_string(),
        "  match <dir> <goal...>                              Match free text against workflows"
            .to_string(),
    ]
}

pub fn help_text() -> String {
    cli_help_lines().join("\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub settings: Option<PathBuf>,
    pub log: Option<PathBuf>,
}

/// Pulls `--settings` and `--log` out of `args` wherever they appear.
pub fn split_global_options(args: Vec<String>) -> Result<(GlobalOptions, Vec<String>), String> {
    let mut options = GlobalOptions::default();
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--settings` requires a path".to_string())?;
                options.settings = Some(PathBuf::from(value));
            }
            "--log" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "`--log` requires a path".to_string())?;
                options.log = Some(PathBuf::from(value));
            }
            _ => rest.push(arg),
        }
    }
    Ok((options, rest))
}
