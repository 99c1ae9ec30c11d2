use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use crate::{api::TrackerApi, storage::session::Theme};

use super::{context::AppContext, output::Palette};

#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommand {
    #[command(about = "Print the current theme")]
    Show,
    #[command(about = "Switch between dark and light")]
    Toggle,
    #[command(about = "Use the given theme")]
    Set { theme: Theme },
}

pub async fn login(
    context: &AppContext,
    api: &dyn TrackerApi,
    email: &str,
    password: &str,
) -> Result<()> {
    let user = api.login(email.trim(), password).await?;
    context.session.save_user(&user).await?;
    info!("Logged in as {}", user.id);

    let palette = &context.palette;
    println!("{}", palette.heading.paint(format!("Welcome {}", user.name)));
    if user.is_admin() {
        println!("Start with `fieldtrack dashboard` or `fieldtrack approvals list`");
    } else {
        println!("Start with `fieldtrack checkin` or `fieldtrack history`");
    }
    Ok(())
}

pub async fn logout(context: &AppContext) -> Result<()> {
    context.session.clear_user().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(context: &AppContext) -> Result<()> {
    let user = context.require_user().await?;
    let palette = &context.palette;
    println!("{}", palette.heading.paint(&user.name));
    println!("{}", user.email);
    println!("{}", palette.muted.paint(format!("{:?} #{}", user.role, user.id)));
    Ok(())
}

pub async fn theme(context: &AppContext, command: Option<ThemeCommand>) -> Result<()> {
    let theme = match command.unwrap_or(ThemeCommand::Show) {
        ThemeCommand::Show => context.session.theme().await?,
        ThemeCommand::Toggle => context.session.toggle_theme().await?,
        ThemeCommand::Set { theme } => {
            context.session.set_theme(theme).await?;
            theme
        }
    };
    println!("{}", Palette::for_theme(theme).heading.paint(theme.to_string()));
    Ok(())
}
