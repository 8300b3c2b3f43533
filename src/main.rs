use clap::Parser;
use discoursehttp::config::{Args, Settings};
use discoursehttp::{AutoLiker, CredentialBundle, Forum, RunSummary, SpoofedClient, TokioPacer, TopicRecord};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use tracing::{error, warn};

const EXIT_AUTH: u8 = 1;
const EXIT_LISTING: u8 = 2;

fn print_topics(topics: &[TopicRecord]) {
    for (i, topic) in topics.iter().enumerate() {
        println!(
            "{:2}. {} (id:{}, likes:{}, replies:{})",
            i + 1,
            topic.title,
            topic.id,
            topic.like_count,
            topic.reply_count
        );
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        let post = outcome
            .result
            .post_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        match outcome.result.error() {
            None => println!("  liked   topic {} post {}: {}", outcome.topic_id, post, outcome.title),
            Some(error) => println!(
                "  failed  topic {} post {}: {} ({})",
                outcome.topic_id, post, outcome.title, error
            ),
        }
    }
    println!();
    println!("topics available: {}", summary.total_available);
    println!("topics browsed:   {}", summary.browsed);
    println!("topics selected:  {}", summary.selected);
    println!("likes succeeded:  {}", summary.success_count);
    println!("likes failed:     {}", summary.failure_count);
    if let Some(rate) = summary.success_rate() {
        println!("success rate:     {:.1}%", rate);
    }
}

fn print_login(bundle: &CredentialBundle) {
    let profile = bundle.profile();
    println!("logged in as {} (id {})", profile.username, profile.id);
    if let Some(level) = profile.trust_level {
        println!("trust level: {}", level);
    }
    println!("cookies: {}", bundle.cookie_names().join(", "));
}

async fn run(settings: Settings) -> ExitCode {
    let client = match SpoofedClient::new(
        settings.origin(),
        settings.user_agent.clone(),
        settings.timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("could not build HTTP client: {}", e);
            return ExitCode::from(EXIT_AUTH);
        }
    };
    let forum = Forum::new(client, settings.origin())
        .timezone(settings.timezone.clone())
        .basic_badge(settings.basic_badge.clone());

    let bundle = match forum
        .authenticate(&settings.credentials, &settings.clearance)
        .await
    {
        Ok(bundle) => bundle,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_AUTH);
        }
    };
    print_login(&bundle);

    if settings.check_session {
        match forum.validate(&bundle, &bundle.profile().username).await {
            Ok(report) => println!(
                "session ok: {} badges, basic user badge: {}",
                report.badge_count,
                if report.has_basic_user_badge() { "yes" } else { "no" }
            ),
            Err(e) => warn!("session check failed: {}", e),
        }
    }

    let mut liker = AutoLiker::new(&forum, StdRng::from_entropy(), TokioPacer);

    if !settings.enable_like {
        return match liker.browse(&bundle, settings.plan.browse_limit).await {
            Ok(report) => {
                print_topics(&report.browsed);
                println!();
                println!("topics available: {}", report.total_available);
                println!("topics browsed:   {}", report.browsed.len());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("failed to list topics: {}", e);
                ExitCode::from(EXIT_LISTING)
            }
        };
    }

    match liker.run(&bundle, &settings.plan).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("auto-like aborted, failed to list topics: {}", e);
            ExitCode::from(EXIT_LISTING)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("discoursehttp=info")),
        )
        .with_target(false)
        .init();

    let settings = match Args::parse().into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_AUTH);
        }
    };

    run(settings).await
}
