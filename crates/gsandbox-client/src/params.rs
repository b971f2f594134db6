//! Operation parameters given as free-form command-line flags.

use clap::Command;
use serde_json::{Map, Value};

/// Parameters for one operation, keyed by their flag name.
pub type Params = Map<String, Value>;

/// Splits raw arguments into those `command` declares and operation params.
///
/// The first argument (the program name) always goes to the command. Long
/// flags not known to `command` are parsed as params: `--key=value`,
/// `--key value`, or a bare `--flag` (which is `true`). Everything after a
/// lone `--` is treated as params too.
pub fn split_args<I, S>(command: &Command, args: I) -> (Vec<String>, Params)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut command = command.clone();
    command.build();

    let mut known = Vec::new();
    let mut params = Params::new();
    let mut args = args.into_iter().map(Into::into).peekable();
    let mut only_params = false;

    if let Some(program) = args.next() {
        known.push(program);
    }

    while let Some(arg) = args.next() {
        if !only_params && arg == "--" {
            only_params = true;
            continue;
        }

        let Some(body) = arg.strip_prefix("--").filter(|b| !b.is_empty()) else {
            if only_params {
                tracing::warn!(arg = %arg, "ignoring stray parameter value");
            } else {
                known.push(arg);
            }
            continue;
        };

        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (body.to_string(), None),
        };

        if !only_params
            && let Some(declared) = command
                .get_arguments()
                .find(|a| a.get_long() == Some(name.as_str()))
        {
            let takes_value = declared.get_action().takes_values();
            known.push(arg);
            if takes_value
                && inline.is_none()
                && let Some(value) = args.next()
            {
                known.push(value);
            }
            continue;
        }

        let value = match inline {
            Some(value) => typed_value(&value),
            None => match args.next_if(|next| !next.starts_with("--")) {
                Some(value) => typed_value(&value),
                None => Value::Bool(true),
            },
        };
        params.insert(name, value);
    }

    (known, params)
}

/// Types a raw flag value: booleans, `null` and integers are recognized,
/// anything else stays a string.
pub fn typed_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}
