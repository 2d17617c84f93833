/// Prompt preview — prints the exact brief that would be sent to the model
/// for a given set of form values, without issuing any request.
///
/// Usage: prompt_preview --genre <g> --theme <t> --setting <s> [options]
///
/// Options:
///   --language <name>      target language (default English)
///   --audience <name>      target audience (default adults)
///   --style <name>         writing style (default vivid)
///   --character <name>     may be repeated, up to 5
///   --words <n>            approximate word target
///   --details <text>       additional details to incorporate
///   --rewrite <file>       preview the rewrite prompt for a story file
use std::process::exit;

use storyweave::core::prompt::{build_prompt, PromptMode};
use storyweave::schema::language::Language;
use storyweave::schema::request::{CharacterRoster, StoryRequest};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut genre = None;
    let mut theme = None;
    let mut setting = None;
    let mut language = "English".to_string();
    let mut audience = "adults".to_string();
    let mut style = "vivid".to_string();
    let mut characters = CharacterRoster::new();
    let mut word_limit = None;
    let mut details = None;
    let mut rewrite_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--genre" if i + 1 < args.len() => {
                i += 1;
                genre = Some(args[i].clone());
            }
            "--theme" if i + 1 < args.len() => {
                i += 1;
                theme = Some(args[i].clone());
            }
            "--setting" if i + 1 < args.len() => {
                i += 1;
                setting = Some(args[i].clone());
            }
            "--language" if i + 1 < args.len() => {
                i += 1;
                language = args[i].clone();
            }
            "--audience" if i + 1 < args.len() => {
                i += 1;
                audience = args[i].clone();
            }
            "--style" if i + 1 < args.len() => {
                i += 1;
                style = args[i].clone();
            }
            "--character" if i + 1 < args.len() => {
                i += 1;
                if let Err(err) = characters.push(args[i].clone()) {
                    eprintln!("error: {err}");
                    exit(1);
                }
            }
            "--words" if i + 1 < args.len() => {
                i += 1;
                match args[i].parse() {
                    Ok(n) => word_limit = Some(n),
                    Err(_) => {
                        eprintln!("error: --words expects a number, got {:?}", args[i]);
                        exit(1);
                    }
                }
            }
            "--details" if i + 1 < args.len() => {
                i += 1;
                details = Some(args[i].clone());
            }
            "--rewrite" if i + 1 < args.len() => {
                i += 1;
                rewrite_path = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unrecognized argument {other:?}");
                print_usage();
                exit(1);
            }
        }
        i += 1;
    }

    let (Some(genre), Some(theme), Some(setting)) = (genre, theme, setting) else {
        eprintln!("error: --genre, --theme, and --setting are required");
        exit(1);
    };

    if characters.is_empty() {
        characters
            .push("Alex")
            .expect("empty roster accepts a name");
    }

    let request = StoryRequest {
        theme,
        setting,
        genre,
        language: Language::new(language),
        audience,
        writing_style: style,
        word_limit,
        additional_details: details,
        characters,
    };

    let prompt = match rewrite_path {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(prior) => build_prompt(&request, PromptMode::Rewrite, Some(&prior)),
            Err(err) => {
                eprintln!("error: could not read {path}: {err}");
                exit(1);
            }
        },
        None => build_prompt(&request, PromptMode::Generate, None),
    };

    println!("{prompt}");
}

fn print_usage() {
    println!("prompt_preview — print the generation brief for a set of form values");
    println!();
    println!("Usage: prompt_preview --genre <g> --theme <t> --setting <s> [options]");
    println!();
    println!("Options:");
    println!("  --language <name>    target language (default English)");
    println!("  --audience <name>    target audience (default adults)");
    println!("  --style <name>       writing style (default vivid)");
    println!("  --character <name>   may be repeated, up to 5");
    println!("  --words <n>          approximate word target");
    println!("  --details <text>     additional details to incorporate");
    println!("  --rewrite <file>     preview the rewrite prompt for a story file");
}
