use anyhow::Context;
use calcnest::lib::calculator::{locale_number, Calculator};
use calcnest::lib::config::{EndpointConfig, ModelConfig};
use calcnest::lib::generator::{Backend, Endpoint, Generator, Llm, EXAMPLE_PROMPTS};
use calcnest::lib::notice::Notice;
use calcnest::lib::session::Session;
use calcnest::tracing::info;
use calcnest::tracing_subscriber::filter;
use calcnest::tracing_subscriber::fmt;
use calcnest::tracing_subscriber::prelude::*;
use calcnest::tracing_subscriber::{Layer, Registry};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Generation endpoint; the model is called directly when absent.
    #[arg(long, env = "CALCNEST_ENDPOINT", global = true)]
    endpoint: Option<String>,
    #[arg(long, env = "CALCNEST_ENDPOINT_KEY", global = true, hide_env_values = true)]
    endpoint_key: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the calculators of a new session.
    List,
    /// Edit a prebuilt calculator and print its results.
    Run {
        /// Key (`tip`, `mortgage`, `bmi`) or position.
        calculator: String,
        /// `name=value`, applied in order.
        #[arg(short, long = "set")]
        set: Vec<String>,
    },
    /// Generate a calculator from a description.
    Generate {
        prompt: String,
        #[arg(short, long = "set")]
        set: Vec<String>,
    },
    /// Print example descriptions.
    Examples,
    /// Interactive session (default).
    Repl,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(e) = add_logging() {
        eprintln!("fails to set up logging: {e:#}");
    }
    if let Err(e) = run(Args::parse()).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn add_logging() -> anyhow::Result<()> {
    let log_directory_path = Path::new(".calcnest.d");
    std::fs::create_dir_all(log_directory_path)
        .with_context(|| "fails to create log directory.")?;

    let open = |name: &str| {
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(log_directory_path.join(name))
            .with_context(|| format!("fails to create `{name}`"))
    };

    let default_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(open("log.log")?)
        .with_filter(
            filter::Targets::default()
                .with_default(filter::LevelFilter::INFO)
                .with_target("llm", filter::LevelFilter::OFF),
        );

    let llm_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(open("llm.log")?)
        .with_filter(filter::Targets::default().with_target("llm", filter::LevelFilter::INFO));

    Registry::default()
        .with(default_layer)
        .with(llm_layer)
        .try_init()?;
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command.unwrap_or(Command::Repl) {
        Command::List => {
            print_list(&Session::new());
            Ok(())
        }
        Command::Run { calculator, set } => {
            let mut session = Session::new();
            let calculator = session
                .get_mut(&calculator)
                .with_context(|| format!("no calculator `{calculator}`"))?;
            apply(calculator, &set)?;
            print_calculator(calculator);
            Ok(())
        }
        Command::Generate { prompt, set } => {
            let generator = generator(args.endpoint, args.endpoint_key)?;
            let mut session = Session::new();
            let calculator = match generator.generate(&prompt).await {
                Ok(spec) => {
                    println!("{}", Notice::generated(spec.title()));
                    session.install_generated(spec)
                }
                Err(e) => {
                    println!("{}", Notice::from(&e));
                    return Err(e.into());
                }
            };
            apply(calculator, &set)?;
            print_calculator(calculator);
            Ok(())
        }
        Command::Examples => {
            EXAMPLE_PROMPTS.iter().for_each(|p| println!("{p}"));
            Ok(())
        }
        Command::Repl => repl(generator(args.endpoint, args.endpoint_key).ok()).await,
    }
}

fn generator(endpoint: Option<String>, key: Option<String>) -> anyhow::Result<Generator> {
    let backend: Arc<dyn Backend> = match endpoint {
        Some(url) => {
            info!("using generation endpoint {url}");
            Arc::new(Endpoint::try_new(&EndpointConfig { url, key })?)
        }
        None => Arc::new(Llm::try_new(ModelConfig::from_env()?)?),
    };
    Ok(Generator::new(backend))
}

fn apply(calculator: &mut Calculator, assignments: &[String]) -> anyhow::Result<()> {
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected `name=value`, got `{assignment}`"))?;
        calculator.set_field_value(name.trim(), value)?;
    }
    Ok(())
}

fn print_list(session: &Session) {
    for (position, (key, calculator)) in session.calculators().enumerate() {
        let spec = calculator.spec();
        println!("{}. [{key}] {}", position + 1, spec.title());
        if let Some(description) = spec.description() {
            println!("   {description}");
        }
    }
}

fn print_calculator(calculator: &Calculator) {
    println!("== {} ==", calculator.title());
    for field in calculator.snapshot().fields() {
        let marker = if field.readonly { "=" } else { ":" };
        println!(
            "  {} ({}) {marker} {}",
            field.label,
            field.name,
            locale_number(field.value)
        );
    }
    let clipboard = calculator.snapshot().clipboard_text();
    if !clipboard.is_empty() {
        println!("-- clipboard --\n{clipboard}");
    }
}

const HELP: &str = "\
commands:
  list                  calculators of this session
  use <key|position>    select a calculator
  set <name> <value>    edit a field of the selected calculator
  show                  print the selected calculator
  copy                  print the results as copied text
  generate <prompt>     generate a calculator from a description
  examples              example descriptions
  quit";

async fn repl(generator: Option<Generator>) -> anyhow::Result<()> {
    let mut session = Session::new();
    let mut selected = String::from("tip");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "list" => print_list(&session),
            "examples" => EXAMPLE_PROMPTS.iter().for_each(|p| println!("  {p}")),
            "use" => match session.resolve(rest) {
                Some(key) => {
                    selected = key.to_string();
                    session.get(key).into_iter().for_each(print_calculator);
                }
                None => println!("no calculator `{rest}`"),
            },
            "show" | "copy" | "set" => {
                let Some(calculator) = session.get_mut(&selected) else {
                    println!("no calculator selected");
                    continue;
                };
                if command == "set" {
                    let Some((name, value)) = rest.split_once(' ') else {
                        println!("usage: set <name> <value>");
                        continue;
                    };
                    if let Err(e) = calculator.set_field_value(name, value) {
                        println!("{e}");
                        continue;
                    }
                }
                if command == "copy" {
                    println!("{}\n{}", calculator.snapshot().clipboard_text(), Notice::copied());
                } else {
                    print_calculator(calculator);
                }
            }
            "generate" => {
                let Some(generator) = &generator else {
                    println!("no generation backend: set OPENAI_API_KEY or CALCNEST_ENDPOINT");
                    continue;
                };
                match generator.generate(rest).await {
                    Ok(spec) => {
                        println!("{}", Notice::generated(spec.title()));
                        print_calculator(session.install_generated(spec));
                        selected = calcnest::lib::session::GENERATED_KEY.to_string();
                    }
                    Err(e) => {
                        info!("generation failed: {e}");
                        println!("{}", Notice::from(&e));
                    }
                }
            }
            _ => println!("unknown command `{command}`; try `help`"),
        }
    }
    Ok(())
}
