use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Clone, Copy, Debug)]
struct CommandSpec {
    command: &'static str,
    action: &'static str,
}

const VALUE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
    },
    CommandSpec {
        command: "seed",
        action: "set_seed",
    },
    CommandSpec {
        command: "negative",
        action: "set_negative",
    },
    CommandSpec {
        command: "aspect",
        action: "set_aspect",
    },
    CommandSpec {
        command: "resolution",
        action: "set_resolution",
    },
    CommandSpec {
        command: "duration",
        action: "set_duration",
    },
    CommandSpec {
        command: "audio",
        action: "set_audio",
    },
    CommandSpec {
        command: "frame_size",
        action: "set_frame_size",
    },
    CommandSpec {
        command: "strength",
        action: "set_strength",
    },
    CommandSpec {
        command: "expand",
        action: "set_expand",
    },
    CommandSpec {
        command: "key",
        action: "set_key",
    },
];

const PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "image",
    action: "stage_image",
}];

const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear_image",
        action: "clear_image",
    },
    CommandSpec {
        command: "form",
        action: "show_form",
    },
    CommandSpec {
        command: "modes",
        action: "modes",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

const SAVE_COMMAND: CommandSpec = CommandSpec {
    command: "save",
    action: "save",
};

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/mode",
    "/seed",
    "/negative",
    "/aspect",
    "/resolution",
    "/duration",
    "/audio",
    "/frame_size",
    "/strength",
    "/expand",
    "/key",
    "/image",
    "/clear_image",
    "/form",
    "/modes",
    "/history",
    "/save",
    "/help",
    "/quit",
];

#[derive(Debug, Clone, PartialEq)]
pub struct StudioIntent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl StudioIntent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect::<Vec<String>>(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<String>>(),
    };
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

pub fn parse_studio_intent(text: &str) -> StudioIntent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return StudioIntent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = if remainder.is_empty() {
                ""
            } else {
                remainder.trim()
            };

            if let Some(action) = find_action(&command, VALUE_COMMANDS) {
                let mut intent = StudioIntent::new(action, text);
                intent
                    .command_args
                    .insert("value".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, PATH_COMMANDS) {
                let mut intent = StudioIntent::new(action, text);
                intent
                    .command_args
                    .insert("path".to_string(), Value::String(parse_path_arg(arg)));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return StudioIntent::new(action, text);
            }

            if command == SAVE_COMMAND.command {
                let mut intent = StudioIntent::new(SAVE_COMMAND.action, text);
                intent.command_args.insert(
                    "index".to_string(),
                    Value::String(if arg.is_empty() {
                        "0".to_string()
                    } else {
                        arg.to_string()
                    }),
                );
                return intent;
            }

            let mut intent = StudioIntent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = StudioIntent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}
