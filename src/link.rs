//! Сборка ссылок доступа Outline (ss://) для выдачи пользователям.

use crate::config::AccessOverride;
use std::ops::Range;

/// Префикс, которым клиент Outline маскирует первые байты соединения под TLS.
pub const OBFUSCATION_PREFIX: &str = "prefix=%16%03%01%00%C2%A8%01%01";

/// Ссылка с префиксом маскировки и именем сервера во фрагменте.
pub fn build_access_link(access_url: &str, server_name: &str) -> String {
    decorate(access_url, server_name)
}

/// Подменяет `host:port` на публичный адрес. `None`, если в ссылке нет `@host:port`.
pub fn build_override_link(access_url: &str, access_override: AccessOverride<'_>) -> Option<String> {
    let endpoint = endpoint_range(access_url)?;
    let mut rewritten = String::with_capacity(access_url.len() + access_override.address.len());
    rewritten.push_str(&access_url[..endpoint.start]);
    rewritten.push_str(access_override.address);
    rewritten.push_str(&access_url[endpoint.end..]);
    Some(decorate(&rewritten, access_override.display_name))
}

fn decorate(access_url: &str, display_name: &str) -> String {
    let base = access_url
        .split_once('#')
        .map(|(base, _)| base)
        .unwrap_or(access_url);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}#{}",
        base,
        separator,
        OBFUSCATION_PREFIX,
        urlencoding::encode(display_name)
    )
}

/// Диапазон `host:port` сразу после `@` в authority ссылки.
/// `@` в пути, query или фрагменте не учитывается.
fn endpoint_range(access_url: &str) -> Option<Range<usize>> {
    let authority_start = access_url.find("://").map_or(0, |pos| pos + 3);
    let authority = &access_url[authority_start..];
    let authority = &authority[..authority.find(['?', '#']).unwrap_or(authority.len())];
    let start = authority_start + authority.find('@')? + 1;
    let rest = &access_url[start..];

    let host_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        .unwrap_or(rest.len());
    if host_len == 0 || !valid_host(&rest[..host_len]) {
        return None;
    }

    let after_host = rest[host_len..].strip_prefix(':')?;
    let port_len = after_host
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_host.len());
    if port_len == 0 || after_host[..port_len].parse::<u16>().is_err() {
        return None;
    }

    Some(start..start + host_len + 1 + port_len)
}

fn valid_host(host: &str) -> bool {
    host.split('.').all(|label| {
        !label.is_empty() && !label.starts_with('-') && !label.ends_with('-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_URL: &str = "ss://Y2hhY2hhMjAtaWV0Zi1wb2x5MTMwNTpzZWNyZXQ@203.0.113.7:31337/?outline=1";

    fn nl_override() -> AccessOverride<'static> {
        AccessOverride {
            address: "vpn.example.com:443",
            display_name: "Netherlands",
        }
    }

    #[test]
    fn plain_link_gets_prefix_and_server_name() {
        assert_eq!(
            build_access_link(KEY_URL, "nl1"),
            format!("{KEY_URL}&{OBFUSCATION_PREFIX}#nl1")
        );
    }

    #[test]
    fn plain_link_without_query_starts_one() {
        let link = build_access_link("ss://abc@1.2.3.4:80", "nl 1");
        assert_eq!(link, format!("ss://abc@1.2.3.4:80?{OBFUSCATION_PREFIX}#nl%201"));
    }

    #[test]
    fn existing_fragment_is_replaced() {
        let link = build_access_link(&format!("{KEY_URL}#old"), "nl1");
        assert!(link.ends_with("#nl1"));
        assert!(!link.contains("#old"));
    }

    #[test]
    fn override_replaces_endpoint() {
        let link = build_override_link(KEY_URL, nl_override()).unwrap();
        assert_eq!(
            link,
            format!(
                "ss://Y2hhY2hhMjAtaWV0Zi1wb2x5MTMwNTpzZWNyZXQ@vpn.example.com:443/?outline=1&{OBFUSCATION_PREFIX}#Netherlands"
            )
        );
    }

    #[test]
    fn override_accepts_hostnames() {
        let link =
            build_override_link("ss://abc@host-1.example.org:8388/?outline=1", nl_override())
                .unwrap();
        assert!(link.starts_with("ss://abc@vpn.example.com:443/?outline=1&"));
    }

    #[test]
    fn override_ignores_at_signs_outside_the_authority() {
        let link = build_override_link(
            "ss://abc@1.2.3.4:80/?outline=1&tag=a@5.6.7.8:9#me@10.0.0.1:22",
            nl_override(),
        )
        .unwrap();
        assert_eq!(
            link,
            format!("ss://abc@vpn.example.com:443/?outline=1&tag=a@5.6.7.8:9&{OBFUSCATION_PREFIX}#Netherlands")
        );

        let link = build_override_link("ss://abc@1.2.3.4:80/p@th", nl_override()).unwrap();
        assert!(link.starts_with("ss://abc@vpn.example.com:443/p@th?"), "{link}");

        assert!(build_override_link("ss://no-endpoint#x@1.2.3.4:80", nl_override()).is_none());
        assert!(build_override_link("ss://abc/?next=x@1.2.3.4:80", nl_override()).is_none());
    }

    #[test]
    fn override_rejects_links_without_endpoint() {
        assert!(build_override_link("ss://no-endpoint", nl_override()).is_none());
        assert!(build_override_link("ss://abc@1.2.3.4/?outline=1", nl_override()).is_none());
        assert!(build_override_link("ss://abc@1.2.3.4:99999/", nl_override()).is_none());
        assert!(build_override_link("ss://abc@:8080/", nl_override()).is_none());
    }
}
