use clap::{ArgGroup, Parser, Subcommand};
use stem_studio_core::{
    project_id_from_stem_url, types::Credentials, Backend, ChannelStatus, ClientConfig,
    ClientStore, FileStore, HeadlessFactory, HttpBackend, JobSource, PollOutcome, StudioApp,
    StudioError, StudioEvent,
};
use std::{path::PathBuf, process, time::Duration};

type App = StudioApp<HttpBackend, FileStore, HeadlessFactory, Box<dyn FnMut(StudioEvent)>>;

#[derive(Parser)]
#[command(name = "stem-studio")]
#[command(about = "Submit tracks for stem separation and mix the results", long_about = None)]
#[command(version)]
struct Cli {
    /// API base URL (overrides STEM_STUDIO_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        /// Create the account if the server does not know it
        #[arg(long)]
        create: bool,
    },

    /// Create an account, then sign in
    Signup {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        email: Option<String>,
    },

    /// Show the signed-in user and remaining credits
    Whoami,

    /// Forget the session token and any tracked job
    Logout,

    /// Upload a file or link and follow the job
    #[command(group(ArgGroup::new("source").required(true).args(["file", "url"])))]
    Submit {
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        url: Option<String>,

        /// Return right after submission instead of polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Continue following a job started by an earlier run
    Resume,

    /// Show sign-in state and the tracked job
    Status,

    /// List finished projects
    History,

    /// Load a project's stems into the headless mixer
    Open {
        project_id: String,

        /// Play this many seconds and report the transport
        #[arg(long, value_parser = parse_preview)]
        preview: Option<f64>,
    },

    /// Delete a project and its stems
    Delete { project_id: String },

    /// Download every stem of a project as a zip
    Download {
        project_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<(), StudioError> {
    let mut cfg = ClientConfig::from_env()?;
    if let Some(base) = &cli.api_base {
        cfg = cfg.with_api_base(base)?;
    }

    let store = FileStore::open(&cfg.state_dir()?)?;
    log::debug!("client state at {}", store.path().display());

    let backend = HttpBackend::new(cfg.clone())?;
    let factory = HeadlessFactory::new(cfg.clone())?;
    let quiet = cli.quiet;
    let sink: Box<dyn FnMut(StudioEvent)> = Box::new(move |ev: StudioEvent| print_event(&ev, quiet));

    let mut app: App = StudioApp::new(backend, store, factory, sink);

    match cli.command {
        Commands::Login {
            username,
            password,
            create,
        } => handle_login(&mut app, Credentials::new(username, password), create),
        Commands::Signup {
            username,
            password,
            email,
        } => {
            let mut creds = Credentials::new(username, password);
            creds.email = email;
            app.tracker().backend().signup(&creds)?;
            eprintln!("✅ Account `{}` created", creds.username);
            handle_login(&mut app, creds, false)
        }
        Commands::Whoami => handle_whoami(&app),
        Commands::Logout => handle_logout(&mut app),
        Commands::Submit { file, url, no_wait } => {
            let source = match (file, url) {
                (Some(f), _) => JobSource::File(f),
                (None, Some(u)) => JobSource::Url(u),
                (None, None) => unreachable!("clap enforces the source group"),
            };
            handle_submit(&mut app, source, no_wait, cfg.poll_interval)
        }
        Commands::Resume => handle_resume(&mut app, cfg.poll_interval),
        Commands::Status => handle_status(&app),
        Commands::History => handle_history(&app),
        Commands::Open {
            project_id,
            preview,
        } => handle_open(&mut app, &project_id, preview),
        Commands::Download { project_id, output } => handle_download(&app, &project_id, output),
        Commands::Delete { project_id } => handle_delete(&mut app, &project_id),
    }
}

fn handle_login(app: &mut App, creds: Credentials, create: bool) -> Result<(), StudioError> {
    let backend = app.tracker().backend();
    let resp = if create {
        backend.login_or_signup(&creds)?
    } else {
        backend.login(&creds)?
    };
    app.sign_in(&resp.token)?;
    eprintln!(
        "✅ Signed in as {} ({} credits, plan {})",
        resp.user.username, resp.user.credits, resp.user.plan
    );
    Ok(())
}

fn handle_whoami(app: &App) -> Result<(), StudioError> {
    let token = app
        .tracker()
        .store()
        .auth_token()
        .ok_or(StudioError::AuthRequired)?;
    let user = app.tracker().backend().me(&token)?;
    eprintln!("👤 {} ({} plan)", user.username, user.plan);
    eprintln!("   Credits: {}", user.credits);
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        eprintln!("   Email:   {email}");
    }
    Ok(())
}

fn handle_logout(app: &mut App) -> Result<(), StudioError> {
    if let Some(token) = app.tracker().store().auth_token() {
        if let Err(e) = app.tracker().backend().logout(&token) {
            log::warn!("server logout failed: {e}");
        }
    }
    app.sign_out()?;
    eprintln!("Signed out");
    Ok(())
}

fn handle_submit(
    app: &mut App,
    source: JobSource,
    no_wait: bool,
    interval: Duration,
) -> Result<(), StudioError> {
    if let Some(earlier) = app.resume() {
        eprintln!("⏳ Job {earlier} from an earlier run is still tracked; following it first");
        if let Err(e) = follow(app, interval) {
            eprintln!("Earlier job ended: {e}");
        }
    }

    eprintln!("📤 Uploading: {}", source);
    let job_id = app.submit(source)?;
    if no_wait {
        println!("{job_id}");
        return Ok(());
    }
    follow(app, interval)
}

fn handle_resume(app: &mut App, interval: Duration) -> Result<(), StudioError> {
    match app.resume() {
        Some(_) => follow(app, interval),
        None => {
            eprintln!("No job to resume");
            Ok(())
        }
    }
}

fn follow(app: &mut App, interval: Duration) -> Result<(), StudioError> {
    match app.run_until_terminal(interval, std::thread::sleep) {
        PollOutcome::Completed { .. } => {
            print_mixer(app);
            app.close_mixer();
            Ok(())
        }
        PollOutcome::Failed { message, .. } => Err(StudioError::JobFailed { message }),
        PollOutcome::Lost { job_id } => Err(StudioError::JobLost { job_id }),
        _ => Ok(()),
    }
}

fn handle_status(app: &App) -> Result<(), StudioError> {
    let store = app.tracker().store();
    eprintln!(
        "Signed in: {}",
        if store.auth_token().is_some() { "yes" } else { "no" }
    );
    match store.active_job() {
        Some(job) => eprintln!("Tracked job: {job}"),
        None => eprintln!("Tracked job: none"),
    }
    Ok(())
}

fn handle_history(app: &App) -> Result<(), StudioError> {
    let token = app
        .tracker()
        .store()
        .auth_token()
        .ok_or(StudioError::AuthRequired)?;
    let projects = app.tracker().backend().history(&token)?;

    eprintln!("📋 Projects");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if projects.is_empty() {
        eprintln!("  No projects yet.");
    }
    for p in &projects {
        let date = p.date.as_deref().unwrap_or("");
        eprintln!("  • {}  {}  ({} stems)  {}", p.id, p.name, p.stems.len(), date);
    }
    Ok(())
}

fn handle_open(app: &mut App, project_id: &str, preview: Option<f64>) -> Result<(), StudioError> {
    let token = app
        .tracker()
        .store()
        .auth_token()
        .ok_or(StudioError::AuthRequired)?;
    let project = app
        .tracker()
        .backend()
        .history(&token)?
        .into_iter()
        .find(|p| p.id == project_id)
        .ok_or_else(|| anyhow::anyhow!("Project `{project_id}` not found"))?;

    app.open_project(&project);
    print_mixer(app);

    if let Some(secs) = preview {
        let report = app.mixer_mut().play()?;
        for name in &report.failed {
            eprintln!("⚠️  {name} did not start");
        }
        let step = 0.25;
        let mut elapsed = 0.0;
        while elapsed < secs {
            if !app.mixer().has_playable() {
                eprintln!("⚠️  No stem could be loaded; nothing to play");
                break;
            }
            app.mixer_mut().advance(step)?;
            elapsed += step;
            match app.mixer().transport() {
                Some(t) if !t.is_playing => break,
                _ => {}
            }
        }
        app.mixer_mut().pause()?;
        if let Some(t) = app.mixer().transport() {
            eprintln!("⏱  {} / {}", clock(t.position), clock(t.duration.unwrap_or(0.0)));
        }
    }

    app.close_mixer();
    Ok(())
}

fn handle_delete(app: &mut App, project_id: &str) -> Result<(), StudioError> {
    let token = app
        .tracker()
        .store()
        .auth_token()
        .ok_or(StudioError::AuthRequired)?;
    app.tracker().backend().delete_project(&token, project_id)?;
    eprintln!("🗑  Deleted project {project_id}");
    app.refresh_history();
    Ok(())
}

fn handle_download(
    app: &App,
    project_id: &str,
    output: Option<PathBuf>,
) -> Result<(), StudioError> {
    let dest = output.unwrap_or_else(|| PathBuf::from(format!("stems_{project_id}.zip")));
    app.tracker()
        .backend()
        .download_zip(project_id, &dest, &mut |downloaded: u64, total: u64| {
            if total > 0 {
                let percent = (downloaded as f64 / total as f64 * 100.0).round() as u64;
                eprint!(
                    "\r📥 Downloading: {:>3}% ({:.2} MB / {:.2} MB)",
                    percent,
                    downloaded as f64 / 1_000_000.0,
                    total as f64 / 1_000_000.0
                );
                if downloaded >= total {
                    eprintln!();
                }
            } else {
                eprint!("\r📥 Downloading: {:.2} MB", downloaded as f64 / 1_000_000.0);
            }
        })?;
    eprintln!("✅ Saved {}", dest.display());
    Ok(())
}

fn print_mixer(app: &App) {
    let mixer = app.mixer();
    let Some(title) = mixer.title() else {
        return;
    };
    eprintln!();
    eprintln!("🎛  {}", title);
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (i, ch) in mixer.channels().iter().enumerate() {
        let state = match ch.status() {
            ChannelStatus::Ready => clock(ch.duration().unwrap_or(0.0)),
            ChannelStatus::Loading => "loading".to_string(),
            ChannelStatus::Unavailable(reason) => format!("unavailable: {reason}"),
        };
        let driver = if i == 0 { " (driver)" } else { "" };
        eprintln!("  {:<12} {}{}", ch.label(), state, driver);
    }
    if let Some(id) = mixer
        .driver()
        .and_then(|d| project_id_from_stem_url(d.source_url()))
    {
        eprintln!();
        eprintln!("Download all: stem-studio download {id}");
    }
}

fn print_event(ev: &StudioEvent, quiet: bool) {
    if quiet {
        return;
    }
    match ev {
        StudioEvent::LoginRequired => eprintln!("🔒 Login required: run `stem-studio login`"),
        StudioEvent::Notice(msg) => eprintln!("ℹ️  {msg}"),
        StudioEvent::JobSubmitted { job_id } => eprintln!("⏳ Job {job_id} queued"),
        StudioEvent::JobResumed { job_id } => eprintln!("⏳ Resuming job {job_id}"),
        StudioEvent::JobProgress {
            status, progress, ..
        } => match progress {
            Some(p) => eprint!("\r🔄 {status} ({p:.0}%)                    "),
            None => eprint!("\r🔄 {status}                    "),
        },
        StudioEvent::JobCompleted { project, .. } => eprintln!("\n✅ Finished: {project}"),
        StudioEvent::JobFailed { message, .. } => eprintln!("\n❌ {message}"),
        StudioEvent::JobLost { job_id } => eprintln!("\n❌ Job {job_id} lost"),
        StudioEvent::PollError { .. }
        | StudioEvent::UploadViewRestored
        | StudioEvent::HistoryRefreshed(_)
        | StudioEvent::MixerOpened { .. }
        | StudioEvent::MixerClosed
        | StudioEvent::LibraryRequested => {}
    }
}

fn parse_preview(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("preview must be a positive, finite number of seconds (got `{raw}`)"))
    }
}

fn clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
