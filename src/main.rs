use std::{net::SocketAddr, path::Path, process, sync::Arc};

use escriba::{
    application::{
        error::AppError,
        rate_limit::{RateLimiter, RateLimiterConfig},
        render::{ContentDocument, PipelineConfig, configure_content_pipeline, content_pipeline},
        revalidate::{RevalidationService, Revalidator},
        seo::{SiteConfig, build_metadata},
    },
    config,
    domain::{entities::PostRecord, slug},
    infra::{
        error::InfraError,
        http::{self, WebhookState},
        revalidator::{HttpRevalidator, LogRevalidator},
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    configure_content_pipeline(PipelineConfig::from(&settings.site))
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(args).await,
        config::Command::Validate(args) => run_validate(args).await,
        config::Command::Slug(args) => run_slug(args),
        config::Command::Seo(args) => run_seo(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(
        settings.rate_limit.window(),
        settings.rate_limit.capacity,
    )));

    let revalidator: Arc<dyn Revalidator> = match settings.revalidate.forward_url.as_deref() {
        Some(url) => Arc::new(HttpRevalidator::new(url)?),
        None => {
            warn!(
                target = "escriba::serve",
                "revalidate.forward_url is not set; targets will only be logged"
            );
            Arc::new(LogRevalidator)
        }
    };
    if settings.revalidate.secret.is_none() {
        warn!(
            target = "escriba::serve",
            "revalidate.secret is not set; every webhook call will be rejected"
        );
    }

    let revalidation = Arc::new(RevalidationService::new(
        settings.revalidate.secret.as_deref(),
        revalidator,
    ));

    let router = http::build_router(WebhookState {
        limiter,
        revalidation,
        max_requests: settings.rate_limit.max_requests.get(),
        trust_forwarded_headers: settings.rate_limit.trust_forwarded_headers,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "escriba::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await
    });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(target = "escriba::serve", error = %err, "failed to listen for shutdown signal");
            }
        }
    }

    info!(target = "escriba::serve", "shutting down");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "escriba::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(args: config::RenderArgs) -> Result<(), AppError> {
    let document = read_document(&args.file, args.format).await?;
    let rendered = content_pipeline().render_document(&document);

    info!(
        target = "escriba::render",
        path = %args.file.display(),
        format = rendered.format.as_str(),
        "rendered content"
    );
    println!("{}", rendered.html);
    Ok(())
}

async fn run_validate(args: config::ValidateArgs) -> Result<(), AppError> {
    let document = read_document(&args.file, args.format).await?;
    let result = content_pipeline().audit(&document);

    let report = serde_json::to_string_pretty(&result)
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{report}");

    if !result.is_valid() {
        return Err(AppError::validation(format!(
            "{} error(s) in {}",
            result.errors().len(),
            args.file.display()
        )));
    }
    Ok(())
}

fn run_slug(args: config::SlugArgs) -> Result<(), AppError> {
    let text = args.text.join(" ");
    let generated = slug::generate(&text).map_err(|err| AppError::validation(err.to_string()))?;
    println!("{generated}");
    Ok(())
}

async fn run_seo(settings: config::Settings, args: config::SeoArgs) -> Result<(), AppError> {
    let raw = read_file(&args.file).await?;
    let post: PostRecord = serde_json::from_str(&raw).map_err(|err| {
        AppError::validation(format!("{} is not a post record: {err}", args.file.display()))
    })?;

    let site = SiteConfig::from(&settings.site);
    let metadata = build_metadata(&post, &site);
    let encoded = if args.json_ld {
        metadata.json_ld()
    } else {
        serde_json::to_string_pretty(&metadata)
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode metadata: {err}")))?;
    println!("{encoded}");
    Ok(())
}

async fn read_document(
    path: &Path,
    format: Option<config::FormatArg>,
) -> Result<ContentDocument, AppError> {
    let raw = read_file(path).await?;
    let document = ContentDocument::new(raw);
    Ok(match format {
        Some(format) => document.with_format(format.into()),
        None => document,
    })
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}
