/*!
 * First-run setup wizard
 *
 * Runs only when there is no configuration document yet. It asks for the
 * logged-in game URL and the browser user agent, then fills both into a
 * copy of the shipped template. Everything the wizard derives from its
 * answers is done by pure functions so it can be tested without a terminal.
 */

use crate::config::document::{SECTION_BOT, SECTION_SERVER};
use crate::config::{Bootstrap, ConfigDocument};
use crate::error::{AgentError, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use serde_json::Value;
use tracing::warn;
use url::Url;

/// Shortest user agent accepted when one is given at all
pub const MIN_USER_AGENT_LEN: usize = 10;

const DISCLAIMER: &str = "\
Read carefully: using this bot can get your account banned or kicked.
Most issues are configuration related. Keep the sleep delays at reasonable
values, and log out/in with the browser regularly (1-2 times per day) and
supply the new cookie string. A single session used for 24h straight will
probably result in a ban.";

/// Game endpoint and world derived from a logged-in URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    /// URL without query string or fragment
    pub endpoint: String,

    /// First host label, lowercased (e.g. `en90`)
    pub server: String,
}

/// Derive the endpoint and world name from a URL copied out of the browser
pub fn server_target_from_url(input: &str) -> Result<ServerTarget> {
    let mut url = Url::parse(input.trim())
        .map_err(|e| AgentError::Bootstrap(format!("invalid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AgentError::Bootstrap(
            "URL must start with https://".to_string(),
        ));
    }
    if !url.path().ends_with("game.php") {
        return Err(AgentError::Bootstrap(
            "URL must point at game.php".to_string(),
        ));
    }

    let server = url
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| AgentError::Bootstrap("URL has no host".to_string()))?;

    url.set_query(None);
    url.set_fragment(None);

    Ok(ServerTarget {
        endpoint: url.to_string(),
        server,
    })
}

/// Empty is allowed (the transport's default is used); anything else must
/// look like a real browser string
pub fn validate_user_agent(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.len() < MIN_USER_AGENT_LEN {
        return Err(AgentError::Bootstrap(
            "It should start with Chrome, Firefox or something. Please try again".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// The template with the wizard's answers filled in
pub fn bootstrap_document(
    template: &ConfigDocument,
    target: &ServerTarget,
    user_agent: &str,
) -> ConfigDocument {
    let mut doc = template.clone();
    doc.set(SECTION_SERVER, "endpoint", Value::String(target.endpoint.clone()));
    doc.set(SECTION_SERVER, "server", Value::String(target.server.clone()));
    doc.set(SECTION_BOT, "user_agent", Value::String(user_agent.to_string()));
    doc
}

/// Terminal wizard; declines when nobody is attached to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveSetup;

impl Bootstrap for InteractiveSetup {
    fn bootstrap(&self, template: &ConfigDocument) -> Result<Option<ConfigDocument>> {
        if !console::user_attended() {
            warn!("No terminal attached, cannot run first-run setup");
            return Ok(None);
        }
        run_setup_wizard(template).map_err(|e| AgentError::Bootstrap(e.to_string()))
    }
}

/// Run the interactive setup wizard
fn run_setup_wizard(template: &ConfigDocument) -> anyhow::Result<Option<ConfigDocument>> {
    print_welcome();
    let theme = ColorfulTheme::default();

    loop {
        let url: String = Input::with_theme(&theme)
            .with_prompt("Game URL while logged in (q to quit)")
            .interact_text()?;
        if url.trim().eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        let target = match server_target_from_url(&url) {
            Ok(target) => target,
            Err(_) => {
                println!(
                    "  {}",
                    style("Make sure your url starts with https:// and contains the game.php? part")
                        .yellow()
                );
                continue;
            }
        };

        println!("  Game endpoint: {}", style(&target.endpoint).cyan());
        println!("  World:         {}", style(target.server.to_uppercase()).cyan());
        if !Confirm::with_theme(&theme)
            .with_prompt("Does this look correct?")
            .default(true)
            .interact()?
        {
            continue;
        }

        let user_agent = loop {
            let input: String = Input::with_theme(&theme)
                .with_prompt("Browser user agent (search \"what is my user agent\")")
                .allow_empty(true)
                .interact_text()?;
            match validate_user_agent(&input) {
                Ok(user_agent) => break user_agent,
                Err(e) => println!("  {} {}", style("Error:").red(), e),
            }
        };

        println!("\n{}\n", style(DISCLAIMER).dim());
        let answer: String = Input::with_theme(&theme)
            .with_prompt("Do you understand this and still wish to continue? Type yes")
            .interact_text()?;
        if !answer.to_lowercase().contains("yes") {
            println!("{}", style("Goodbye :)").cyan());
            return Ok(None);
        }

        let doc = bootstrap_document(template, &target, &user_agent);
        print_summary(&target);
        return Ok(Some(doc));
    }
}

fn print_welcome() {
    println!();
    println!("{}", style("╔════════════════════════════════════════╗").cyan());
    println!("{}", style("║    Outpost first-run setup             ║").cyan());
    println!("{}", style("╚════════════════════════════════════════╝").cyan());
    println!();
    println!("No configuration file was found. Log in with your browser and paste the game URL.");
}

fn print_summary(target: &ServerTarget) {
    println!();
    println!("{}", style("╔════════════════════════════════════════╗").green());
    println!("{}", style("║    Configuration created               ║").green());
    println!("{}", style("╚════════════════════════════════════════╝").green());
    println!();
    println!("  Endpoint: {}", style(&target.endpoint).yellow());
    println!("  World:    {}", style(&target.server).yellow());
    println!();
    println!("  {}", style("Next Steps:").bold());
    println!("  1. Add your session cookie as server.cookie");
    println!("  2. Review the bot section (active hours and delays)");
    println!();
}
