//! Админские действия над ключами: разбор аргументов, вызовы API, текст ответа.

use super::args::{parse_key_action, parse_list_keys, parse_server_only, parse_set_data_limit};
use super::error::CommandError;
use super::format::{render_keys_table, render_server_info, spoiler};
use super::shared::{Reply, build_qr_png_bytes, find_key, resolve_server};
use crate::config::{Config, ServerConfig};
use crate::link::{build_access_link, build_override_link};
use crate::outline::{ApiError, KeyApi};
use crate::units::gb_to_bytes;
use teloxide::utils::html;

pub const USAGE_ADD_KEY: &str = "/add_key <server> <key_name>";
pub const USAGE_DELETE_KEY: &str = "/delete_key <server> <key_id>";
pub const USAGE_GET_ACCESS_URL: &str = "/get_access_url <server> <key_id>";
pub const USAGE_GET_ACCESS_URL_OVERRIDE: &str = "/get_access_url_override <server> <key_id>";
pub const USAGE_GET_ACCESS_QR: &str = "/get_access_qr <server> <key_id>";
pub const USAGE_SERVER_INFO: &str = "/server_info <server>";

pub async fn list_keys<C, F>(config: &Config, text: &str, connect: F) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let server_name = parse_list_keys(text)?;
    let (_, client) = resolve_server(config, &server_name, &connect)?;

    let total = client.aggregate_usage().await?;
    let info = client.server_info().await?;
    let keys = client.list_keys().await?;
    tracing::info!(server = %server_name, keys = keys.len(), "Listed access keys");

    Ok(render_keys_table(&server_name, total, info.default_limit_bytes, &keys)
        .into_iter()
        .map(Reply::Html)
        .collect())
}

pub async fn add_key<C, F>(config: &Config, text: &str, connect: F) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let action = parse_key_action(text, USAGE_ADD_KEY)?;
    let (_, client) = resolve_server(config, &action.server, &connect)?;

    let key = client.create_key(&action.key).await?;
    tracing::info!(server = %action.server, key_id = %key.id, "Access key added");

    Ok(vec![
        Reply::Text(format!(
            "Сервер {}, создан ключ {}: {}",
            action.server, key.id, key.name
        )),
        Reply::Html(spoiler(&key.access_url)),
    ])
}

pub async fn delete_key<C, F>(config: &Config, text: &str, connect: F) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let action = parse_key_action(text, USAGE_DELETE_KEY)?;
    let (_, client) = resolve_server(config, &action.server, &connect)?;

    client.delete_key(&action.key).await?;
    tracing::info!(server = %action.server, key_id = %action.key, "Access key deleted");

    Ok(vec![Reply::Text(format!(
        "Сервер {}, удалён ключ {}",
        action.server, action.key
    ))])
}

pub async fn get_access_url<C, F>(
    config: &Config,
    text: &str,
    connect: F,
) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let action = parse_key_action(text, USAGE_GET_ACCESS_URL)?;
    let (_, client) = resolve_server(config, &action.server, &connect)?;

    let key = find_key(&client, &action.key).await?;
    let link = build_access_link(&key.access_url, &action.server);

    Ok(vec![Reply::Html(format!(
        "{}\n{}",
        html::escape(&key.name),
        spoiler(&link)
    ))])
}

pub async fn get_access_url_override<C, F>(
    config: &Config,
    text: &str,
    connect: F,
) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let action = parse_key_action(text, USAGE_GET_ACCESS_URL_OVERRIDE)?;
    let (server, client) = resolve_server(config, &action.server, &connect)?;
    let access_override = server
        .access_override()
        .ok_or_else(|| CommandError::NoOverrideConfigured(action.server.clone()))?;

    let key = find_key(&client, &action.key).await?;
    let link = build_override_link(&key.access_url, access_override)
        .ok_or_else(|| CommandError::UnparsableUrl(key.id.clone()))?;

    Ok(vec![Reply::Html(format!(
        "{}\n{}",
        html::escape(&key.name),
        spoiler(&link)
    ))])
}

pub async fn get_access_qr<C, F>(
    config: &Config,
    text: &str,
    connect: F,
) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let action = parse_key_action(text, USAGE_GET_ACCESS_QR)?;
    let (_, client) = resolve_server(config, &action.server, &connect)?;

    let key = find_key(&client, &action.key).await?;
    let link = build_access_link(&key.access_url, &action.server);
    let png = build_qr_png_bytes(&link).map_err(|e| CommandError::Qr(e.to_string()))?;

    Ok(vec![Reply::Photo {
        png,
        file_name: format!("outline-{}-{}.png", action.server, key.id),
        caption: format!("Сервер {}, ключ {}: {}", action.server, key.id, key.name),
    }])
}

/// Лимит 0 GB снимает ограничение с ключа.
pub async fn set_data_limit<C, F>(
    config: &Config,
    text: &str,
    connect: F,
) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let args = parse_set_data_limit(text)?;
    let (_, client) = resolve_server(config, &args.server, &connect)?;
    let bytes = gb_to_bytes(&args.limit_gb).map_err(|source| CommandError::Parse {
        value: args.limit_gb.clone(),
        source,
    })?;

    if bytes == 0 {
        client.remove_data_limit(&args.key).await?;
        return Ok(vec![Reply::Text(format!(
            "Сервер {}, лимит ключа {} снят",
            args.server, args.key
        ))]);
    }

    tracing::info!(
        server = %args.server,
        key_id = %args.key,
        limit_gb = %args.limit_gb,
        "Setting data limit"
    );
    client.set_data_limit(&args.key, bytes).await?;
    Ok(vec![Reply::Text(format!(
        "Сервер {}, ключу {} установлен лимит {}GB",
        args.server, args.key, args.limit_gb
    ))])
}

pub async fn server_info<C, F>(config: &Config, text: &str, connect: F) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let server_name = parse_server_only(text, USAGE_SERVER_INFO)?;
    let (_, client) = resolve_server(config, &server_name, &connect)?;

    let info = client.server_info().await?;
    let total = client.aggregate_usage().await?;
    Ok(vec![Reply::Text(render_server_info(&server_name, &info, total))])
}
