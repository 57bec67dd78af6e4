use crate::outline::{AccessKey, ServerInfo};
use crate::units::bytes_to_gb;
use chrono::{DateTime, Local, Utc};
use teloxide::utils::html;

const NAME_WIDTH: usize = 12;
/// Telegram режет сообщения длиннее 4096 символов, оставляем запас.
const MESSAGE_LIMIT: usize = 4000;
const PRE_CLOSE: &str = "</pre>";

pub fn format_timestamp_ms(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %:z")
                .to_string()
        })
        .unwrap_or_else(|| format!("Некорректный timestamp: {}", ts_ms))
}

/// Скрывает текст под спойлер, чтобы ссылка не светилась в чате.
pub fn spoiler(text: &str) -> String {
    format!("<tg-spoiler>{}</tg-spoiler>", html::escape(text))
}

fn truncate_name(name: &str) -> String {
    name.chars().take(NAME_WIDTH).collect()
}

/// Заголовок и таблица ключей в `<pre>`, отсортированная по имени.
/// Длинная таблица делится на несколько сообщений, строка ключа не разрывается.
pub fn render_keys_table(
    server: &str,
    total_bytes: u64,
    default_limit: Option<u64>,
    keys: &[AccessKey],
) -> Vec<String> {
    let mut sorted: Vec<&AccessKey> = keys.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let header = format!(
        "server: {}, total: {:.1} GB, default limit: {:.1} GB",
        server,
        bytes_to_gb(Some(total_bytes)),
        bytes_to_gb(default_limit)
    );
    let columns = format!(
        "{:<4} {:<width$} {:>7} {:>7}",
        "id",
        "name",
        "used",
        "limit",
        width = NAME_WIDTH
    );
    let opening = format!("<pre>{}", html::escape(columns.trim_end()));

    let mut messages = Vec::new();
    let mut current = format!("{}\n{}", html::escape(&header), opening);
    let mut current_len = current.chars().count();
    let mut rows_in_current = 0usize;
    for key in sorted {
        let row = format!(
            "{:<4} {:<width$} {:>7.1} {:>7.1}",
            key.id,
            truncate_name(&key.name),
            bytes_to_gb(key.used_bytes),
            bytes_to_gb(key.limit_bytes.or(default_limit)),
            width = NAME_WIDTH
        );
        let row = html::escape(row.trim_end());
        let row_len = row.chars().count() + 1;

        if rows_in_current > 0 && current_len + row_len + PRE_CLOSE.len() > MESSAGE_LIMIT {
            current.push_str(PRE_CLOSE);
            messages.push(std::mem::replace(&mut current, opening.clone()));
            current_len = opening.chars().count();
            rows_in_current = 0;
        }
        current.push('\n');
        current.push_str(&row);
        current_len += row_len;
        rows_in_current += 1;
    }
    current.push_str(PRE_CLOSE);
    messages.push(current);
    messages
}

pub fn render_server_info(server: &str, info: &ServerInfo, total_bytes: u64) -> String {
    format!(
        "Сервер {}\n\
         Имя: {}\n\
         ID: {}\n\
         Версия: {}\n\
         Создан: {}\n\
         Адрес для ключей: {}:{}\n\
         Лимит по умолчанию: {}\n\
         Передано всего: {:.1} GB",
        server,
        info.name,
        info.server_id,
        info.version.as_deref().unwrap_or("—"),
        info.created_timestamp_ms
            .map(format_timestamp_ms)
            .unwrap_or_else(|| "—".to_string()),
        info.hostname_for_access_keys.as_deref().unwrap_or("—"),
        info.port_for_new_access_keys
            .map(|port| port.to_string())
            .unwrap_or_else(|| "—".to_string()),
        info.default_limit_bytes
            .map(|bytes| format!("{:.1} GB", bytes_to_gb(Some(bytes))))
            .unwrap_or_else(|| "без лимита".to_string()),
        bytes_to_gb(Some(total_bytes)),
    )
}
