use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use careerpath_client::api::{account, ai, dashboard, roadmaps};
use careerpath_client::auth::{SessionManager, SessionPhase, SqliteStore};
use careerpath_client::config::{self, Command, Config};
use careerpath_client::http_client::ApiClient;
use careerpath_client::models::{Roadmap, SkillUpdate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::debug!(api_url = %config.api_url, store = %config.store_path.display(), "Configuration loaded");

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.http_connect_timeout))
        .timeout(Duration::from_secs(config.http_request_timeout))
        .user_agent(format!("careerpath-cli/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let store = Arc::new(SqliteStore::open(&config.store_path)?);
    let session = SessionManager::new(&config.api_url, store, client)?;
    let api = ApiClient::new(session.clone());

    if let Err(e) = run(command, &session, &api).await {
        // Show backend messages as-is
        match e.downcast_ref::<careerpath_client::error::ApiError>() {
            Some(api_err) => eprintln!("Error: {}", api_err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize logging with the configured level
fn init_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(command: Command, session: &SessionManager, api: &ApiClient) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = config::prompt_if_missing(email, "Email")?;
            let password = config::prompt_password(false)?;
            let user = session.login(&email, &password).await?;
            println!("Signed in as {}", user.email);
            if !user.is_email_verified {
                println!("Your email address is not verified yet.");
            }
        }

        Command::Register { username, email } => {
            let username = config::prompt_if_missing(username, "Username")?;
            let email = config::prompt_if_missing(email, "Email")?;
            let password = config::prompt_password(true)?;
            let user = session.register(&username, &email, &password).await?;
            println!("Account created, signed in as {}", user.email);
            println!("Check your inbox for a verification link.");
        }

        Command::Logout => {
            session.logout().await;
            println!("Signed out");
        }

        Command::Status => {
            let snapshot = session.snapshot().await;
            println!("  Phase:         {:?}", snapshot.phase);
            println!("  Access token:  {}", present(snapshot.has_access_token));
            println!("  Refresh token: {}", present(snapshot.has_refresh_token));
            if let Some(user) = snapshot.user {
                println!("  Cached user:   {}", user.email);
            }
        }

        Command::Whoami => {
            require_session(session).await?;
            let user = session
                .user()
                .await
                .context("Not signed in")?;
            println!("  Id:        {}", user.id);
            println!("  Email:     {}", user.email);
            if let Some(ref username) = user.username {
                println!("  Username:  {}", username);
            }
            println!("  Active:    {}", user.is_active);
            println!("  Verified:  {}", user.is_email_verified);
        }

        Command::Refresh => {
            session.refresh().await?;
            println!("Access token refreshed");
        }

        Command::VerifyEmail { token } => {
            let resp = account::verify_email(api, &token).await?;
            println!("{}", resp.message);
        }

        Command::RequestVerification => {
            require_session(session).await?;
            let resp = account::request_verification_email(api).await?;
            println!("{}", resp.message);
        }

        Command::Roadmaps { id } => {
            require_session(session).await?;
            match id {
                Some(id) => print_roadmap(&roadmaps::get(api, id).await?, true),
                None => {
                    let all = roadmaps::list(api).await?;
                    if all.is_empty() {
                        println!("No roadmaps yet. Try `careerpath generate \"<goal>\"`.");
                    }
                    for roadmap in &all {
                        print_roadmap(roadmap, false);
                    }
                }
            }
        }

        Command::Generate { goal } => {
            require_session(session).await?;
            println!("Generating roadmap, this can take a minute...");
            let roadmap = roadmaps::generate(api, &goal).await?;
            print_roadmap(&roadmap, true);
        }

        Command::CreateRoadmap { title, description } => {
            require_session(session).await?;
            let roadmap = roadmaps::create(api, &title, description.as_deref()).await?;
            print_roadmap(&roadmap, false);
        }

        Command::SkillStatus { skill_id, status } => {
            require_session(session).await?;
            let skill = roadmaps::update_skill_status(api, skill_id, &status).await?;
            println!("{} is now {}", skill.name, skill.status);
        }

        Command::UpdateSkill {
            skill_id,
            name,
            hours,
            difficulty,
            description,
        } => {
            require_session(session).await?;
            let update = SkillUpdate {
                name,
                description,
                estimated_hours: hours,
                difficulty,
            };
            let skill = roadmaps::update_skill(api, skill_id, &update).await?;
            println!(
                "#{} {} ({}h, {})",
                skill.id, skill.name, skill.estimated_hours, skill.difficulty
            );
        }

        Command::DeleteSkill { skill_id } => {
            require_session(session).await?;
            let skill = roadmaps::delete_skill(api, skill_id).await?;
            println!("Removed #{} {}", skill.id, skill.name);
        }

        Command::Stats => {
            require_session(session).await?;
            let stats = dashboard::stats(api).await?;
            println!("  Goals:     {}/{}", stats.completed_goals, stats.total_goals);
            println!("  Skills:    {}/{}", stats.completed_skills, stats.total_skills);
            println!("  Progress:  {}%", stats.roadmap_progress);
        }

        Command::Goals => {
            require_session(session).await?;
            for goal in dashboard::goals(api).await? {
                println!("  [{:>3}%] {} ({})", goal.progress, goal.name, goal.status);
            }
        }

        Command::Recommendations => {
            require_session(session).await?;
            for rec in dashboard::recommendations(api).await? {
                println!("  {:<9} {}", rec.kind, rec.name);
                if let Some(ref description) = rec.description {
                    println!("            {}", description);
                }
            }
        }

        Command::Chat { message } => {
            require_session(session).await?;
            let reply = ai::chat(api, &message).await?;
            println!("{}", reply.response);
        }

        Command::DeleteAccount { yes } => {
            require_session(session).await?;
            if !yes && !config::confirm("Delete your account permanently?")? {
                println!("Cancelled");
                return Ok(());
            }
            account::delete_account(api).await?;
            println!("Account deleted");
        }
    }

    Ok(())
}

/// Restore the stored session and fail early when there is none
async fn require_session(session: &SessionManager) -> Result<()> {
    if session.bootstrap().await != SessionPhase::Authenticated {
        anyhow::bail!("Not signed in. Run `careerpath login` first.");
    }
    Ok(())
}

fn present(yes: bool) -> &'static str {
    if yes {
        "stored"
    } else {
        "none"
    }
}

fn print_roadmap(roadmap: &Roadmap, detailed: bool) {
    println!(
        "[{}] {} ({}% done, ~{}h left)",
        roadmap.id,
        roadmap.title,
        roadmap.progress_percent(),
        roadmap.remaining_hours()
    );
    if !detailed {
        return;
    }
    if let Some(ref description) = roadmap.description {
        println!("    {}", description);
    }
    for topic in &roadmap.topics {
        println!("  # {}", topic.name);
        for subtopic in &topic.subtopics {
            println!("    - {}", subtopic.name);
            for skill in &subtopic.skills {
                let mark = if skill.is_completed() { "x" } else { " " };
                println!(
                    "      [{}] #{} {} ({}h, {})",
                    mark, skill.id, skill.name, skill.estimated_hours, skill.difficulty
                );
            }
        }
    }
}
