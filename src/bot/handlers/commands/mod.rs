use super::actions;
use super::error::CommandError;
use super::shared::{HandlerResult, Reply, send_replies};
use super::state::{BotState, is_admin_message, sender_display_name, sender_user_id};
use crate::config::{Config, ServerConfig};
use crate::outline::{ApiError, KeyApi, OutlineClient};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{BotCommandScope, Recipient, UserId};
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case")]
pub enum BotCommand {
    #[command(description = "Запустить бота, показать серверы и обновить команды")]
    Start,
    #[command(description = "Справка по командам")]
    Help,
    #[command(description = "Ключи на сервере: server")]
    ListKeys,
    #[command(description = "Создать ключ: server key_name")]
    AddKey,
    #[command(description = "Удалить ключ: server key_id")]
    DeleteKey,
    #[command(description = "Ссылка доступа: server key_id")]
    GetAccessUrl,
    #[command(description = "Ссылка через публичный адрес: server key_id")]
    GetAccessUrlOverride,
    #[command(description = "QR-код ссылки доступа: server key_id")]
    GetAccessQr,
    #[command(description = "Лимит трафика: server key_id limit_gb (0 снимает лимит)")]
    SetDataLimit,
    #[command(description = "Информация о сервере: server")]
    ServerInfo,
}

/// Админские команды над ключами. `Start` и `Help` обрабатываются отдельно.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    ListKeys,
    AddKey,
    DeleteKey,
    GetAccessUrl,
    GetAccessUrlOverride,
    GetAccessQr,
    SetDataLimit,
    ServerInfo,
}

impl BotCommand {
    pub fn key_command(&self) -> Option<KeyCommand> {
        match self {
            BotCommand::Start | BotCommand::Help => None,
            BotCommand::ListKeys => Some(KeyCommand::ListKeys),
            BotCommand::AddKey => Some(KeyCommand::AddKey),
            BotCommand::DeleteKey => Some(KeyCommand::DeleteKey),
            BotCommand::GetAccessUrl => Some(KeyCommand::GetAccessUrl),
            BotCommand::GetAccessUrlOverride => Some(KeyCommand::GetAccessUrlOverride),
            BotCommand::GetAccessQr => Some(KeyCommand::GetAccessQr),
            BotCommand::SetDataLimit => Some(KeyCommand::SetDataLimit),
            BotCommand::ServerInfo => Some(KeyCommand::ServerInfo),
        }
    }
}

/// Что делать с командой в зависимости от прав отправителя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Handle,
    Reject,
    Ignore,
}

pub fn gate(command: &BotCommand, is_admin: bool) -> Access {
    match (is_admin, command) {
        (true, _) => Access::Handle,
        (false, BotCommand::Start) => Access::Reject,
        (false, _) => Access::Ignore,
    }
}

fn access_of(command: &BotCommand, msg: &Message, state: &BotState) -> Access {
    gate(command, is_admin_message(msg, state))
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let admin = dptree::filter(|cmd: BotCommand, msg: Message, state: BotState| {
        access_of(&cmd, &msg, &state) == Access::Handle
    })
    .branch(dptree::case![BotCommand::Start].endpoint(start_cmd))
    .branch(dptree::case![BotCommand::Help].endpoint(cmd_help))
    .branch(dptree::filter_map(|cmd: BotCommand| cmd.key_command()).endpoint(admin_cmd));

    let rejected = dptree::filter(|cmd: BotCommand, msg: Message, state: BotState| {
        access_of(&cmd, &msg, &state) == Access::Reject
    })
    .endpoint(not_admin_cmd);

    teloxide::filter_command::<BotCommand, _>()
        .branch(admin)
        .branch(rejected)
}

pub async fn execute<C, F>(
    config: &Config,
    command: KeyCommand,
    text: &str,
    connect: F,
) -> Result<Vec<Reply>, CommandError>
where
    C: KeyApi,
    F: Fn(&ServerConfig) -> Result<C, ApiError>,
{
    match command {
        KeyCommand::ListKeys => actions::list_keys(config, text, connect).await,
        KeyCommand::AddKey => actions::add_key(config, text, connect).await,
        KeyCommand::DeleteKey => actions::delete_key(config, text, connect).await,
        KeyCommand::GetAccessUrl => actions::get_access_url(config, text, connect).await,
        KeyCommand::GetAccessUrlOverride => {
            actions::get_access_url_override(config, text, connect).await
        }
        KeyCommand::GetAccessQr => actions::get_access_qr(config, text, connect).await,
        KeyCommand::SetDataLimit => actions::set_data_limit(config, text, connect).await,
        KeyCommand::ServerInfo => actions::server_info(config, text, connect).await,
    }
}

/// Ошибка команды превращается в однострочный ответ, дальше не распространяется.
pub fn replies_or_error(command: KeyCommand, result: Result<Vec<Reply>, CommandError>) -> Vec<Reply> {
    match result {
        Ok(replies) => replies,
        Err(error) => {
            tracing::warn!(command = ?command, error = %error, "Command failed");
            vec![Reply::Text(error.to_string())]
        }
    }
}

async fn admin_cmd(bot: Bot, msg: Message, cmd: KeyCommand, state: BotState) -> HandlerResult {
    let text = msg.text().unwrap_or("");
    tracing::info!(
        user_id = ?sender_user_id(&msg),
        display_name = ?sender_display_name(&msg),
        command = ?cmd,
        "Admin command received"
    );

    let result = execute(&state.config, cmd, text, OutlineClient::connect).await;
    send_replies(&bot, msg.chat.id, replies_or_error(cmd, result)).await
}

pub fn greeting_text(config: &Config) -> String {
    let servers: Vec<&str> = config.server_names().collect();
    format!(
        "Привет, админ! Команды обновлены, доступные серверы:\n{}",
        servers.join("\n")
    )
}

pub fn rejection_text(user_id: i64) -> String {
    format!(
        "Вы не администратор. Ваш id: {}\nПередайте его администратору для добавления в admin_ids.",
        user_id
    )
}

/// Меню команд видит только отправитель: в личке это сам чат, в группе участник чата.
pub fn sender_scope(chat_id: ChatId, user_id: UserId) -> BotCommandScope {
    if chat_id.is_user() {
        BotCommandScope::Chat {
            chat_id: Recipient::Id(chat_id),
        }
    } else {
        BotCommandScope::ChatMember {
            chat_id: Recipient::Id(chat_id),
            user_id,
        }
    }
}

async fn start_cmd(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let scope = sender_scope(msg.chat.id, user.id);
    tracing::info!(
        user_id = ?sender_user_id(&msg),
        display_name = ?sender_display_name(&msg),
        username = ?msg.from.as_ref().and_then(|u| u.username.clone()),
        "Received /start command"
    );

    bot.delete_my_commands().scope(scope.clone()).await?;
    bot.set_my_commands(BotCommand::bot_commands())
        .scope(scope)
        .await?;
    bot.send_message(msg.chat.id, greeting_text(&state.config))
        .await?;
    Ok(())
}

async fn not_admin_cmd(bot: Bot, msg: Message) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    tracing::warn!(
        user_id = user_id,
        display_name = ?sender_display_name(&msg),
        username = ?msg.from.as_ref().and_then(|u| u.username.clone()),
        "Start attempt from non-admin user"
    );

    bot.delete_my_commands()
        .scope(sender_scope(msg.chat.id, user.id))
        .await?;
    bot.send_message(msg.chat.id, rejection_text(user_id)).await?;
    Ok(())
}

pub async fn cmd_help(bot: Bot, msg: Message) -> HandlerResult {
    let text = format!(
        "Команды:\n\
         /start — список серверов и обновление меню команд\n\
         /list_keys <server> — ключи и трафик\n\
         {} — создать ключ\n\
         {} — удалить ключ\n\
         {} — ссылка доступа\n\
         {} — ссылка через публичный адрес\n\
         {} — QR-код ссылки\n\
         /set_data_limit <server> <key_id> <limit_gb> — лимит трафика, 0 снимает лимит\n\
         {} — информация о сервере\n\n\
         Имя ключа с пробелами берите в кавычки: \"My Key\"",
        actions::USAGE_ADD_KEY,
        actions::USAGE_DELETE_KEY,
        actions::USAGE_GET_ACCESS_URL,
        actions::USAGE_GET_ACCESS_URL_OVERRIDE,
        actions::USAGE_GET_ACCESS_QR,
        actions::USAGE_SERVER_INFO,
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
