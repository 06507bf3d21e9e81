mod cli;

use formtree::context::{AccessPlan, FormContext};
use formtree::engine::FormEngine;
use formtree::form_documents::{FormConfig, FormDocuments};
use formtree::store::MemoryStore;
use formtree::visibility::Viewer;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("FORMTREE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err);
                    std::process::exit(1);
                }

                tracing::info!(directory = %cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Fields(fields_cli) => fields(fields_cli),
        cli::Command::Render(render_cli) => render(render_cli),
        cli::Command::FreeEnroll(free_enroll_cli) => free_enroll(free_enroll_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn fields(cli: cli::FormCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.input)?;
    let context = context(&cli.viewer);

    let Some(fields) = engine.get_form_fields(&cli.location, &context) else {
        anyhow::bail!("No form found for location `{}`", cli.location);
    };

    output(&cli.output, &fields)
}

pub fn render(cli: cli::RenderCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.input)?;
    let context = context(&cli.viewer);

    anyhow::ensure!(
        engine.is_location_valid(&cli.location),
        "Unknown form location `{}`",
        cli.location
    );

    println!("{}", engine.get_form_markup(&cli.location, &context));
    Ok(())
}

pub fn free_enroll(cli: cli::FreeEnrollCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.input)?;
    let context = context(&cli.viewer);
    let plan = AccessPlan::new(cli.plan_id, cli.redirect);

    if cli.markup {
        println!("{}", engine.get_free_enrollment_markup(&plan, &context));
        return Ok(());
    }

    output(&cli.output, &engine.get_free_enrollment_fields(&plan, &context))
}

fn context(viewer: &cli::ViewerArgs) -> FormContext {
    FormContext::for_viewer(Viewer {
        logged_in: viewer.logged_in,
        can_manage_forms: viewer.can_manage_forms,
    })
}

fn engine(input: &cli::InputArgs) -> anyhow::Result<FormEngine<MemoryStore>> {
    let documents = load(input)?;
    let FormConfig {
        registry,
        mut store,
    } = FormConfig::new(&documents)?;

    if input.install {
        for (location, result) in store.install(&registry, false) {
            match result {
                Ok(()) => tracing::info!(%location, "template installed"),
                Err(error) => tracing::debug!(%location, %error, "template not installed"),
            }
        }
    }

    Ok(FormEngine::new(store).with_registry(registry))
}

fn load(input: &cli::InputArgs) -> anyhow::Result<FormDocuments> {
    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let body = hcl_edit::parser::parse_body(&stdin)?;
        return Ok(body.into());
    }

    let mut documents = FormDocuments::default();

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, value: &impl serde::Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// (formtree-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    match cli.command {
        Documents => {
            let documents = load(&cli.input)?;
            println!("{documents:#?}");
        }
        Blocks {
            location,
            viewer,
            output: output_args,
        } => {
            let engine = engine(&cli.input)?;
            let Some(form) = engine.compose_form(&location, &context(&viewer)) else {
                anyhow::bail!("No form found for location `{location}`");
            };
            output(&output_args, &form)?;
        }
    }

    Ok(())
}
