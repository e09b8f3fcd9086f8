//! Pull request security review — `tuinbeheer security-review`.

use anyhow::{Result, bail};
use console::style;

use tuinbeheer::config::TuinConfig;
use tuinbeheer::tools::security_review::github::GitHubClient;
use tuinbeheer::tools::security_review::openai::OpenAiClient;
use tuinbeheer::tools::security_review::{ReviewEnv, ReviewSettings, SecurityReviewer};
use tuinbeheer::ui::icons::{CHECK, LOCK, WARN};
use tuinbeheer::ui::{finish_spinner, spinner};

pub async fn cmd_security_review(config: &TuinConfig) -> Result<()> {
    let env = ReviewEnv::from_env()?;
    let settings = ReviewSettings::from_config(config);
    let fail_on_high = settings.fail_on_high;

    println!(
        "{}Reviewing {}#{} with {}",
        LOCK, env.repo, env.pr_number, settings.model
    );
    let host = GitHubClient::new(env.github_token, env.repo, env.pr_number);
    let model = OpenAiClient::new(env.openai_api_key, settings.model.clone());
    let reviewer = SecurityReviewer::new(&host, &model, settings);

    let bar = spinner("Waiting for the model...");
    let outcome = reviewer.run().await;
    finish_spinner(&bar, "");
    let outcome = outcome?;

    let c = &outcome.counts;
    println!(
        "{}Reviewed {} file(s): {} critical, {} high, {} medium, {} low",
        CHECK, outcome.files_reviewed, c.critical, c.high, c.medium, c.low
    );
    if let Some(validation) = &outcome.validation
        && !validation.is_valid()
    {
        println!(
            "{}{}",
            WARN,
            style(format!("Report incomplete: {}", validation.missing.join(", "))).yellow()
        );
    }

    if outcome.should_fail(fail_on_high) {
        bail!("Critical or high severity findings present");
    }
    Ok(())
}
