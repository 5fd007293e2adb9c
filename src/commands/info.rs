use chrono::{NaiveDate, Utc};
use poise::serenity_prelude as serenity;

use crate::{Context, Error};

const INVITE_PERMISSIONS: u64 = 37604544;

const LINKS: &[(&str, &str)] = &[
    ("Xythrion Github repository", "https://github.com/Xithrius/Xythrion"),
    ("Xithrius' Twitter", "https://twitter.com/_Xithrius"),
    ("Xithrius' Github", "https://github.com/Xithrius"),
];

const ORIGIN_URL: &str =
    "https://github.com/Xithrius/Xythrion/tree/55fe604d293e42240905e706421241279caf029e";

/// Gives the invite link of this bot.
///
/// Command examples:
///     >>> [prefix]invite
#[poise::command(prefix_command)]
pub async fn invite(ctx: Context<'_>) -> Result<(), Error> {
    let url = invite_url(ctx.framework().bot_id.get());
    let embed = serenity::CreateEmbed::new().description(format!("[`Xythrion invite url`]({})", url));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Returns information about this bot's origin.
///
/// Command examples:
///     >>> [prefix]info
#[poise::command(prefix_command)]
pub async fn info(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new().description(info_description(project_age_days(Utc::now().date_naive())));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn invite_url(client_id: u64) -> String {
    format!(
        "https://discord.com/oauth2/authorize?client_id={}&scope=bot&permissions={}",
        client_id, INVITE_PERMISSIONS
    )
}

fn project_created() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 3, 13).unwrap_or_default()
}

/// Whole days between project creation and `today`.
fn project_age_days(today: NaiveDate) -> i64 {
    (today - project_created()).num_days().abs()
}

fn info_description(age_days: i64) -> String {
    let origin = format!(
        "[`Project created {} days ago, on March 13, 2019`]({})",
        age_days, ORIGIN_URL
    );
    std::iter::once(origin)
        .chain(LINKS.iter().map(|(label, url)| format!("[`{}`]({})", label, url)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_url() {
        assert_eq!(
            invite_url(42),
            "https://discord.com/oauth2/authorize?client_id=42&scope=bot&permissions=37604544"
        );
    }

    #[test]
    fn test_project_age() {
        assert_eq!(project_age_days(project_created()), 0);
        let a_year_later = NaiveDate::from_ymd_opt(2020, 3, 13).unwrap();
        // 2020 is a leap year
        assert_eq!(project_age_days(a_year_later), 366);
    }

    #[test]
    fn test_info_description() {
        let text = info_description(10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("[`Project created 10 days ago"));
        assert!(lines[1].contains("https://github.com/Xithrius/Xythrion)"));
    }
}
