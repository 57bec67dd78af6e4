//! Позиционный разбор аргументов админских команд.

use super::error::CommandError;

const USAGE_LIST_KEYS: &str = "/list_keys <server>";
const USAGE_SET_DATA_LIMIT: &str = "/set_data_limit <server> <key_id> <limit_gb>";

/// Кавычки, которые снимаются с имени или id ключа.
const QUOTES: &[char] = &['"', '“', '”'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAction {
    pub server: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLimitArgs {
    pub server: String,
    pub key: String,
    pub limit_gb: String,
}

pub fn parse_list_keys(text: &str) -> Result<String, CommandError> {
    parse_server_only(text, USAGE_LIST_KEYS)
}

pub fn parse_server_only(text: &str, usage: &'static str) -> Result<String, CommandError> {
    let mut tokens = text.split_whitespace().skip(1);
    tokens
        .next()
        .map(str::to_string)
        .ok_or(CommandError::Arity { usage })
}

/// `usage` подставляется в ответ, если сервера или ключа нет.
pub fn parse_key_action(text: &str, usage: &'static str) -> Result<KeyAction, CommandError> {
    let mut tokens = text.split_whitespace().skip(1);
    let server = tokens.next().ok_or(CommandError::Arity { usage })?;
    let key = next_key_token(&mut tokens).ok_or(CommandError::Arity { usage })?;
    Ok(KeyAction {
        server: server.to_string(),
        key,
    })
}

pub fn parse_set_data_limit(text: &str) -> Result<DataLimitArgs, CommandError> {
    let usage = USAGE_SET_DATA_LIMIT;
    let mut tokens = text.split_whitespace().skip(1);
    let server = tokens.next().ok_or(CommandError::Arity { usage })?;
    let key = next_key_token(&mut tokens).ok_or(CommandError::Arity { usage })?;
    let limit_gb = tokens.next().ok_or(CommandError::Arity { usage })?;
    Ok(DataLimitArgs {
        server: server.to_string(),
        key,
        limit_gb: limit_gb.to_string(),
    })
}

/// Ключ в кавычках может занимать несколько токенов: `"My Key"`.
fn next_key_token<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<String> {
    let first = tokens.next()?;
    let mut raw = first.to_string();
    if first.starts_with(QUOTES) && !closes_quote(first) {
        for token in tokens.by_ref() {
            raw.push(' ');
            raw.push_str(token);
            if token.ends_with(QUOTES) {
                break;
            }
        }
    }
    let key = raw.trim_matches(QUOTES).trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

fn closes_quote(token: &str) -> bool {
    token.chars().count() > 1 && token.ends_with(QUOTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USAGE: &str = "/delete_key <server> <key_id>";

    #[test]
    fn list_keys_requires_server() {
        assert_eq!(parse_list_keys("/list_keys nl1").unwrap(), "nl1");
        assert_eq!(parse_list_keys("/list_keys@outline_bot  nl1 extra").unwrap(), "nl1");
        assert!(matches!(
            parse_list_keys("/list_keys"),
            Err(CommandError::Arity { .. })
        ));
    }

    #[test]
    fn key_action_strips_quotes() {
        let action = parse_key_action("/delete_key nl1 \"My Key\"", USAGE).unwrap();
        assert_eq!(action.server, "nl1");
        assert_eq!(action.key, "My Key");

        let action = parse_key_action("/delete_key nl1 “phone”", USAGE).unwrap();
        assert_eq!(action.key, "phone");

        let action = parse_key_action("/delete_key nl1 \"7\"", USAGE).unwrap();
        assert_eq!(action.key, "7");
    }

    #[test]
    fn unquoted_key_is_a_single_token() {
        let action = parse_key_action("/add_key nl1 My Key", USAGE).unwrap();
        assert_eq!(action.key, "My");
    }

    #[test]
    fn key_action_arity() {
        for text in ["/delete_key", "/delete_key nl1", "/delete_key nl1 \"\""] {
            match parse_key_action(text, USAGE) {
                Err(CommandError::Arity { usage }) => assert_eq!(usage, USAGE),
                other => panic!("{text}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn set_data_limit_takes_three_positions() {
        let args = parse_set_data_limit("/set_data_limit nl1 3 20").unwrap();
        assert_eq!(
            args,
            DataLimitArgs {
                server: "nl1".into(),
                key: "3".into(),
                limit_gb: "20".into(),
            }
        );

        let args = parse_set_data_limit("/set_data_limit nl1 \"Big Key\" 5").unwrap();
        assert_eq!(args.key, "Big Key");
        assert_eq!(args.limit_gb, "5");

        assert!(matches!(
            parse_set_data_limit("/set_data_limit nl1 3"),
            Err(CommandError::Arity { .. })
        ));
    }
}
