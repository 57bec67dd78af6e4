use super::error::CommandError;
use crate::config::{Config, ServerConfig};
use crate::outline::{AccessKey, ApiError, KeyApi};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Ответ на команду, отправляемый в тот же чат.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Html(String),
    Photo {
        png: Vec<u8>,
        file_name: String,
        caption: String,
    },
}

/// Находит сервер в реестре и открывает к нему клиент.
pub fn resolve_server<'a, C, F>(
    config: &'a Config,
    name: &str,
    connect: &F,
) -> Result<(&'a ServerConfig, C), CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    let server = config
        .server(name)
        .ok_or_else(|| CommandError::UnknownServer(name.to_string()))?;
    let client = connect(server)?;
    Ok((server, client))
}

/// Линейный поиск ключа по id.
pub async fn find_key<C: KeyApi>(client: &C, key_id: &str) -> Result<AccessKey, CommandError> {
    client
        .list_keys()
        .await?
        .into_iter()
        .find(|key| key.id == key_id)
        .ok_or_else(|| CommandError::NotFound(key_id.to_string()))
}

pub fn build_qr_png_bytes(payload: &str) -> Result<Vec<u8>, anyhow::Error> {
    let qr = QrCode::new(payload.as_bytes())?;
    let image = qr
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(512, 512)
        .build();
    let mut bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut bytes);
        DynamicImage::ImageLuma8(image).write_to(&mut cursor, ImageFormat::Png)?;
    }
    Ok(bytes)
}

pub async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) -> HandlerResult {
    for reply in replies {
        match reply {
            Reply::Text(text) => {
                bot.send_message(chat_id, text).await?;
            }
            Reply::Html(text) => {
                bot.send_message(chat_id, text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Reply::Photo {
                png,
                file_name,
                caption,
            } => {
                bot.send_photo(chat_id, InputFile::memory(png).file_name(file_name))
                    .caption(caption)
                    .has_spoiler(true)
                    .await?;
            }
        }
    }
    Ok(())
}
