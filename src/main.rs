use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use taskmanager::config::Config;
use taskmanager::configure_app;
use taskmanager::notifications::{EmailService, PgReminderStore, ReminderJob, ReminderScheduler};

#[derive(Debug, Parser)]
#[command(name = "taskmanager", about = "Task manager API with email reminders")]
struct Cli {
    /// Run one reminder job now and exit instead of starting the server.
    #[arg(long, value_enum)]
    run_job: Option<ReminderJob>,
}

fn startup_error<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::Other, error)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let config = Config::from_env().map_err(startup_error)?;
    if std::env::var("JWT_SECRET").is_err() {
        return Err(startup_error("JWT_SECRET must be set"));
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(startup_error)?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(startup_error)?;

    let email = EmailService::from_config(config.smtp.as_ref(), &config.frontend_url).map_err(startup_error)?;
    let scheduler = ReminderScheduler::new(Arc::new(PgReminderStore::new(pool.clone())), email.clone());

    if let Some(job) = cli.run_job {
        let report = scheduler.run_job(job, Utc::now()).await.map_err(startup_error)?;
        log::info!(
            "{}: {} subscriber(s), {} email(s) sent, {} skipped, {} failed",
            job,
            report.subscribers,
            report.emails_sent,
            report.skipped,
            report.failures
        );
        return Ok(());
    }

    if config.scheduler_enabled {
        let _scheduler = scheduler.start();
    } else {
        log::info!("SCHEDULER_ENABLED=false; reminder jobs will not run");
    }

    log::info!("Starting server at {}", config.server_url());

    let pool = web::Data::new(pool);
    let email = web::Data::new(email);
    let frontend_origin = config.frontend_url.trim_end_matches('/').to_string();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(pool.clone())
            .app_data(email.clone())
            .configure(configure_app)
    })
    .bind((config.server_host.clone(), config.server_port))?
    .run()
    .await
}
