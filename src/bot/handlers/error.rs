use crate::outline::ApiError;
use crate::units::LimitError;
use thiserror::Error;

/// Ошибка выполнения команды. Текст ошибки целиком уходит ответом в чат.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Использование: {usage}")]
    Arity { usage: &'static str },
    #[error("Сервер {0} не найден в конфигурации")]
    UnknownServer(String),
    #[error("Ключ {0} не найден")]
    NotFound(String),
    #[error("Для сервера {0} не настроен override-адрес")]
    NoOverrideConfigured(String),
    #[error("Не удалось разобрать ссылку доступа ключа {0}")]
    UnparsableUrl(String),
    #[error("Некорректный лимит {value}: {source}")]
    Parse {
        value: String,
        #[source]
        source: LimitError,
    },
    #[error("Не удалось построить QR-код: {0}")]
    Qr(String),
    #[error(transparent)]
    RemoteApi(#[from] ApiError),
}
