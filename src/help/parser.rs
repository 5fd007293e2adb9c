use super::{CommandInfo, HelpError, HelpSource};

/// Line that opens the examples section of a documentation block.
pub const EXAMPLES_MARKER: &str = "Command examples:";

const NONE: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHelp {
    pub description: String,
    pub examples: String,
    pub aliases: String,
    pub subcommands: String,
}

/// Renders the help fields of one command with the live prefix.
pub fn parse_help(command: &CommandInfo, prefix: &str) -> Result<ParsedHelp, HelpError> {
    let (description, examples) = match &command.help {
        HelpSource::Metadata(metadata) => (
            metadata.description.clone(),
            metadata
                .examples
                .iter()
                .map(|invocation| format!("{}{}", prefix, invocation.trim()))
                .collect::<Vec<_>>(),
        ),
        HelpSource::Docs(text) => {
            parse_docs(text, prefix).ok_or_else(|| HelpError::MalformedMetadata {
                module: command.module.clone(),
                command: command.name.clone(),
            })?
        }
    };

    Ok(ParsedHelp {
        description,
        examples: examples.join(", "),
        aliases: join_or_none(&command.aliases),
        subcommands: join_or_none(&command.subcommands),
    })
}

fn parse_docs(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let lines: Vec<&str> = text.lines().collect();
    let description = lines.first().copied().unwrap_or_default().to_string();

    let marker = lines.iter().position(|line| line.trim() == EXAMPLES_MARKER)?;
    let examples = lines[marker + 1..]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| render_example(line, prefix))
        .collect();

    Some((description, examples))
}

/// `>>> [prefix]tts hi` becomes `<prefix>tts hi`. Everything up to the first
/// `]` is a placeholder; lines without one only lose the `>>>` lead.
fn render_example(line: &str, prefix: &str) -> String {
    let rest = match line.find(']') {
        Some(idx) => &line[idx + 1..],
        None => line.trim_start_matches(">>>"),
    };
    format!("{}{}", prefix, rest.trim())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}
