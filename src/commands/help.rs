use poise::serenity_prelude as serenity;

use crate::help::{CommandInfo, HelpIndex, ParsedHelp};
use crate::{Context, Error};

const EMBED_COLOR: u32 = 0x5865F2;

/// Shows help for every command, or for one
#[poise::command(prefix_command, aliases("h"))]
pub async fn help(ctx: Context<'_>, command: Option<String>) -> Result<(), Error> {
    let registry = &ctx.data().extensions;
    let index = registry.help_index();

    let embed = match command {
        None => overview_embed(&index, registry.snapshot().diagnostics.len()),
        Some(name) => {
            let commands = registry.commands();
            match lookup(&index, &commands, &name) {
                Some((module, help)) => command_embed(module, &resolve_name(&commands, &name), help),
                None => {
                    ctx.say(format!("No help found for `{}`.", name)).await?;
                    return Ok(());
                }
            }
        }
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Finds help by command name or any of its aliases.
fn lookup<'a>(
    index: &'a HelpIndex,
    commands: &[CommandInfo],
    name: &str,
) -> Option<(&'a str, &'a ParsedHelp)> {
    index.find(&resolve_name(commands, name))
}

fn resolve_name(commands: &[CommandInfo], name: &str) -> String {
    commands
        .iter()
        .find(|command| command.answers_to(name))
        .map(|command| command.name.to_lowercase())
        .unwrap_or_else(|| name.to_lowercase())
}

fn overview_lines(index: &HelpIndex) -> Vec<(String, String)> {
    index
        .modules()
        .map(|module| {
            let names: Vec<String> = module
                .commands
                .iter()
                .map(|(name, _)| format!("`{}`", name))
                .collect();
            (module.name.clone(), names.join(" "))
        })
        .collect()
}

fn overview_embed(index: &HelpIndex, skipped: usize) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title("Help")
        .description("Use `help <command>` for details on a command.")
        .color(EMBED_COLOR);
    for (module, commands) in overview_lines(index) {
        embed = embed.field(module, commands, false);
    }
    if skipped > 0 {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "{} command(s) have unreadable help",
            skipped
        )));
    }
    embed
}

fn command_embed(module: &str, name: &str, help: &ParsedHelp) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(name)
        .description(&help.description)
        .field("Examples", &help.examples, false)
        .field("Aliases", &help.aliases, true)
        .field("Subcommands", &help.subcommands, true)
        .footer(serenity::CreateEmbedFooter::new(format!("Module: {}", module)))
        .color(EMBED_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::help::HelpMetadata;

    fn commands() -> Vec<CommandInfo> {
        vec![
            CommandInfo::new("reload", "main")
                .aliases(["refresh", "r"])
                .metadata(HelpMetadata::new("Reloads extensions.").example("reload")),
            CommandInfo::new("invite", "cogs.meta.info")
                .metadata(HelpMetadata::new("Invite link.").example("invite")),
        ]
    }

    #[test]
    fn test_lookup_by_alias() {
        let commands = commands();
        let (index, _) = HelpIndex::build(&commands, ";");

        let (module, help) = lookup(&index, &commands, "R").unwrap();
        assert_eq!(module, "main");
        assert_eq!(help.description, "Reloads extensions.");
        assert_eq!(resolve_name(&commands, "refresh"), "reload");
    }

    #[test]
    fn test_lookup_unknown() {
        let commands = commands();
        let (index, _) = HelpIndex::build(&commands, ";");
        assert!(lookup(&index, &commands, "nope").is_none());
    }

    #[test]
    fn test_overview_keeps_module_order() {
        let commands = commands();
        let (index, _) = HelpIndex::build(&commands, ";");

        let lines = overview_lines(&index);
        assert_eq!(
            lines,
            vec![
                ("main".to_string(), "`reload`".to_string()),
                ("cogs.meta.info".to_string(), "`invite`".to_string()),
            ]
        );
    }
}
