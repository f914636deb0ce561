use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use mirage_contracts::credential::ApiKey;
use mirage_contracts::modes::{
    orientation_label, ModeCatalog, ASPECT_RATIOS, DEFAULT_NEGATIVE_PROMPT, DURATIONS, FRAME_SIZES,
    RESOLUTIONS,
};
use mirage_contracts::request::{GenerationForm, StagedImage, RANDOM_SEED};
use mirage_contracts::studio::{parse_studio_intent, STUDIO_HELP_COMMANDS};
use mirage_engine::{content_type_or_sniff, inline_data_url, mime_for_path, Session};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mirage", version, about = "Wan 2.5 generation sessions from the terminal")]
struct Cli {
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Modes,
    Generate(GenerateArgs),
    Studio(StudioArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long, default_value = "text-to-video")]
    mode: String,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = DEFAULT_NEGATIVE_PROMPT)]
    negative_prompt: String,
    #[arg(long, default_value_t = RANDOM_SEED)]
    seed: i64,
    #[arg(long, default_value = ASPECT_RATIOS[0])]
    aspect_ratio: String,
    #[arg(long, default_value = RESOLUTIONS[0])]
    resolution: String,
    #[arg(long, default_value = DURATIONS[0])]
    duration: String,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    expand_prompt: bool,
    #[arg(long)]
    audio_url: Option<String>,
    #[arg(long)]
    image: Option<String>,
    #[arg(long)]
    inline_image: bool,
    #[arg(long, default_value = FRAME_SIZES[0])]
    frame_size: String,
    #[arg(long, default_value_t = 0.8)]
    strength: f64,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    #[arg(long, default_value = "text-to-video")]
    mode: String,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long, default_value = "out")]
    out: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mirage error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Modes => {
            print_modes(&ModeCatalog::default());
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Studio(args) => {
            run_studio(args)?;
            Ok(0)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut session = Session::from_env();
    let form = GenerationForm {
        prompt: args.prompt,
        negative_prompt: args.negative_prompt,
        seed: args.seed,
        aspect_ratio: args.aspect_ratio,
        resolution: args.resolution,
        duration: args.duration,
        enable_prompt_expansion: args.expand_prompt,
        audio_url: args.audio_url,
        frame_size: args.frame_size,
        strength: args.strength,
        api_key: args.api_key,
    };

    if let Some(image) = args.image.as_deref() {
        stage_image_input(&mut session, image, args.inline_image)?;
    }

    let record = session.generate(&args.mode, &form)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}: {}", record.kind.label(), record.url);
        println!("Seed: {}", record.seed_label());
        if let Some(expanded) = &record.expanded_prompt {
            println!("Expanded prompt: {expanded}");
        }
    }

    if let Some(out_dir) = args.out.as_deref() {
        let saved = session.download(0, out_dir)?;
        println!("Saved to {}", saved.display());
    }
    Ok(0)
}

fn stage_image_input(session: &mut Session, input: &str, inline: bool) -> Result<()> {
    if input.starts_with("http://") || input.starts_with("https://") {
        session.stage_image_url(input);
        return Ok(());
    }
    let path = Path::new(input);
    let bytes = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    // Unknown extensions stay undeclared; the type is sniffed from the bytes.
    let declared = mime_for_path(path).unwrap_or_default();
    if inline {
        let content_type = content_type_or_sniff(&bytes, declared);
        session.stage_image_url(inline_data_url(&bytes, &content_type));
    } else {
        session.stage_image_bytes(bytes, declared);
    }
    Ok(())
}

fn run_studio(args: StudioArgs) -> Result<()> {
    let mut session = Session::from_env();
    let mut form = GenerationForm::default();
    let mut mode = args.mode;
    if let Some(key) = args.api_key {
        form.api_key = Some(key);
    }
    tracing::debug!("studio session {} started", session.id());

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Mirage studio started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_studio_intent(input);
        if intent.action == "noop" {
            continue;
        }

        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", STUDIO_HELP_COMMANDS.join(" "));
            }
            "set_mode" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value {
                    Some(name) if session.catalog().get(&name).is_some() => {
                        mode = name;
                        println!("Mode set to {mode}");
                    }
                    _ => println!("/mode takes one of: {}", session.catalog().names().join(", ")),
                }
            }
            "set_seed" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value.as_deref().map(str::parse::<i64>) {
                    Some(Ok(seed)) if seed >= RANDOM_SEED => {
                        form.seed = seed;
                        if seed == RANDOM_SEED {
                            println!("Seed cleared (random)");
                        } else {
                            println!("Seed set to {seed}");
                        }
                    }
                    Some(_) => println!("/seed takes an integer >= -1"),
                    None => {
                        form.seed = RANDOM_SEED;
                        println!("Seed cleared (random)");
                    }
                }
            }
            "set_negative" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value {
                    Some(text) => {
                        println!("Negative prompt set to {text}");
                        form.negative_prompt = text;
                    }
                    None => {
                        form.negative_prompt.clear();
                        println!("Negative prompt cleared");
                    }
                }
            }
            "set_aspect" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match pick_option(value, &ASPECT_RATIOS) {
                    Some(choice) => {
                        println!("Aspect ratio set to {choice}");
                        form.aspect_ratio = choice;
                    }
                    None => println!("/aspect takes one of: {}", ASPECT_RATIOS.join(", ")),
                }
            }
            "set_resolution" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match pick_option(value, &RESOLUTIONS) {
                    Some(choice) => {
                        println!("Resolution set to {choice}");
                        form.resolution = choice;
                    }
                    None => println!("/resolution takes one of: {}", RESOLUTIONS.join(", ")),
                }
            }
            "set_duration" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match pick_option(value, &DURATIONS) {
                    Some(choice) => {
                        println!("Duration set to {choice}s");
                        form.duration = choice;
                    }
                    None => println!("/duration takes one of: {}", DURATIONS.join(", ")),
                }
            }
            "set_expand" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value.as_deref() {
                    Some("on") | Some("true") => form.enable_prompt_expansion = true,
                    Some("off") | Some("false") => form.enable_prompt_expansion = false,
                    Some(other) => {
                        println!("/expand takes on or off, not {other}");
                        continue;
                    }
                    None => form.enable_prompt_expansion = !form.enable_prompt_expansion,
                }
                println!(
                    "Prompt expansion {}",
                    if form.enable_prompt_expansion { "on" } else { "off" }
                );
            }
            "set_audio" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value {
                    Some(url) => {
                        println!("Audio URL set to {url}");
                        form.audio_url = Some(url);
                    }
                    None => {
                        form.audio_url = None;
                        println!("Audio URL cleared");
                    }
                }
            }
            "set_frame_size" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                let found = value.as_deref().and_then(|value| {
                    FRAME_SIZES.iter().copied().find(|entry| {
                        *entry == value || entry.split_whitespace().next() == Some(value)
                    })
                });
                match found {
                    Some(entry) => {
                        form.frame_size = entry.to_string();
                        println!("Frame size set to {entry}");
                    }
                    None => println!("/frame_size takes one of: {}", FRAME_SIZES.join(", ")),
                }
            }
            "set_strength" => {
                let parsed = value_as_non_empty_string(intent.command_args.get("value"))
                    .and_then(|value| value.parse::<f64>().ok())
                    .filter(|value| value.is_finite() && (0.0..=1.0).contains(value));
                match parsed {
                    Some(value) => {
                        form.strength = value;
                        println!("Strength set to {value}");
                    }
                    None => println!("/strength takes a number between 0 and 1"),
                }
            }
            "set_key" => {
                let value = value_as_non_empty_string(intent.command_args.get("value"));
                match value {
                    Some(raw) => match ApiKey::parse(&raw) {
                        Ok(key) => {
                            form.api_key = Some(raw);
                            println!("API key set ({key})");
                        }
                        Err(err) => println!("{err}"),
                    },
                    None => {
                        form.api_key = None;
                        println!("API key cleared (falling back to FAL_KEY)");
                    }
                }
            }
            "stage_image" => {
                let path_text = value_as_non_empty_string(intent.command_args.get("path"));
                let Some(path_text) = path_text else {
                    println!("/image requires a file path or an http(s) URL");
                    continue;
                };
                if path_text.starts_with("http://") || path_text.starts_with("https://") {
                    session.stage_image_url(path_text);
                    println!("Image staged from URL");
                    continue;
                }
                let path = PathBuf::from(&path_text);
                match fs::read(&path) {
                    Ok(bytes) => {
                        let declared = mime_for_path(&path).unwrap_or_default();
                        if declared.is_empty() {
                            println!("Image staged ({} bytes)", bytes.len());
                        } else {
                            println!("Image staged ({} bytes, {declared})", bytes.len());
                        }
                        session.stage_image_bytes(bytes, declared);
                    }
                    Err(err) => println!("Could not read {}: {err}", path.display()),
                }
            }
            "clear_image" => {
                session.clear_staged_image();
                println!("Staged image cleared");
            }
            "show_form" => {
                print_form(&mode, &form, session.staged_image());
            }
            "modes" => {
                print_modes(session.catalog());
            }
            "history" => {
                if session.history().is_empty() {
                    println!("No results yet.");
                    continue;
                }
                for (index, record) in session.history().iter().enumerate() {
                    println!(
                        "[{index}] {} seed={} {}",
                        record.mode,
                        record.seed_label(),
                        record.url
                    );
                    if let Some(expanded) = &record.expanded_prompt {
                        println!("    expanded: {expanded}");
                    }
                }
            }
            "save" => {
                let index = value_as_non_empty_string(intent.command_args.get("index"))
                    .and_then(|value| value.parse::<usize>().ok());
                let Some(index) = index else {
                    println!("/save takes a history index");
                    continue;
                };
                match session.download(index, &args.out) {
                    Ok(path) => println!("Saved to {}", path.display()),
                    Err(err) => println!("Save failed: {err}"),
                }
            }
            "quit" => break,
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("Unknown command: {command}");
            }
            "generate" => {
                let prompt = intent.prompt.clone().unwrap_or_default();
                if prompt.trim().is_empty() {
                    continue;
                }
                form.prompt = prompt;

                let started = Instant::now();
                match session.generate(&mode, &form) {
                    Ok(record) => {
                        println!(
                            "{} ready in {:.1}s: {}",
                            record.kind.label(),
                            started.elapsed().as_secs_f64(),
                            record.url
                        );
                        println!("Seed: {}", record.seed_label());
                        if let Some(expanded) = &record.expanded_prompt {
                            println!("Expanded prompt: {expanded}");
                        }
                    }
                    Err(err) => println!("Generation failed: {err}"),
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn print_modes(catalog: &ModeCatalog) {
    println!("Modes:");
    for mode in catalog.list() {
        println!("  {:<16} {} ({})", mode.name, mode.model_id, mode.output.label());
    }
    let aspects = ASPECT_RATIOS
        .iter()
        .map(|ratio| match orientation_label(ratio) {
            Some(label) => format!("{ratio} ({label})"),
            None => ratio.to_string(),
        })
        .collect::<Vec<String>>();
    println!("Aspect ratios: {}", aspects.join(", "));
    println!("Resolutions: {}", RESOLUTIONS.join(", "));
    println!("Durations: {}s", DURATIONS.join("s, "));
    println!("Frame sizes: {}", FRAME_SIZES.join(", "));
}

fn print_form(mode: &str, form: &GenerationForm, staged: &StagedImage) {
    println!("Mode: {mode}");
    let seed = if form.seed == RANDOM_SEED {
        "random".to_string()
    } else {
        form.seed.to_string()
    };
    println!("Seed: {seed}");
    println!("Aspect ratio: {}", form.aspect_ratio);
    println!("Resolution: {}", form.resolution);
    println!("Duration: {}s", form.duration);
    println!("Frame size: {}", form.frame_size);
    println!("Strength: {}", form.strength);
    println!("Prompt expansion: {}", if form.enable_prompt_expansion { "on" } else { "off" });
    let negative = form.negative_prompt.trim();
    println!("Negative prompt: {}", if negative.is_empty() { "(none)" } else { negative });
    println!("Audio URL: {}", form.audio_url.as_deref().unwrap_or("(none)"));
    println!("Staged image: {}", staged.describe());
    println!(
        "API key: {}",
        if form.api_key.is_some() {
            "set for this session"
        } else {
            "FAL_KEY fallback"
        }
    );
}

fn pick_option(value: Option<String>, allowed: &[&str]) -> Option<String> {
    value.filter(|value| allowed.contains(&value.as_str()))
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
