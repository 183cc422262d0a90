use std::{fs::OpenOptions, path::PathBuf};

use anyhow::anyhow;
use clap::Parser;
use timetuah_tui::{
    component::App,
    config::Project,
    console::ConsoleApp,
    sys::GroqClient,
};

#[derive(Debug, clap::Parser)]
#[command(name = "timetuah", about = "Chat with historical figures")]
struct Args {
    /// TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// persona to start with
    #[arg(long, short)]
    persona: Option<String>,

    /// override `model.model_id`
    #[arg(long)]
    model: Option<String>,

    /// line mode on stdin/stdout instead of the full screen UI
    #[arg(long)]
    plain: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,

    /// where Ctrl+S and /save write transcripts
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

fn init_logger(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow!("log file `{}` err:{e}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_logger(cli.log_file.as_ref())?;

    let mut project = match &cli.config {
        Some(path) => Project::load(path)?,
        None => Project::default(),
    };
    if let Some(model) = cli.model {
        project.model.model_id = model;
    }
    project.fill_default_value();
    log::info!("model: {}", project.model.model_id);

    let registry = project.registry();
    let session = project.new_session(&registry, cli.persona.as_deref());
    let client = GroqClient::from_env(project.model.clone())?;

    if cli.plain {
        let stdin = std::io::stdin();
        ConsoleApp::new(registry, session, cli.export_dir).run_loop(
            &client,
            stdin.lock(),
            std::io::stdout(),
        )?;
        return Ok(());
    }

    let app = App::new(registry, session, cli.export_dir);
    let res = app.run_loop(client);

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}
