use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::LazyLock;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use super::DatabaseLocator;
use crate::error::SqlCaddyError;
use crate::types::Dialect;

static LOCATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<scheme>[A-Za-z][A-Za-z0-9_]*)(?:\+(?P<driver>[A-Za-z0-9_]+))?://
        (?:
            (?P<username>[^:/@?]*)
            (?::(?P<password>[^@]*))?
        @)?
        (?:\[(?P<ipv6host>[^\]]+)\]|(?P<host>[^/:?]+))?
        (?::(?P<port>[^/?]*))?
        (?:/(?P<database>[^?]*))?
        (?:\?(?P<query>.*))?
        $",
    )
    .expect("locator pattern is valid")
});

/// Characters escaped inside the user-info part.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'@')
    .add(b':')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']');

const HOST: &AsciiSet = &USERINFO.remove(b':');

const DATABASE: &AsciiSet = &CONTROLS.add(b' ').add(b'%').add(b'?').add(b'#');

const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'&')
    .add(b'=')
    .add(b'#')
    .add(b'+');

impl FromStr for DatabaseLocator {
    type Err = SqlCaddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = LOCATOR_RE
            .captures(s.trim())
            .ok_or_else(|| SqlCaddyError::InvalidLocator(format!("not a locator: {s:?}")))?;

        let dialect: Dialect = caps["scheme"].parse()?;
        let text = |name: &str| caps.name(name).map(|m| m.as_str());

        let port = match text("port").filter(|p| !p.is_empty()) {
            Some(p) => Some(p.parse::<u16>().map_err(|_| {
                SqlCaddyError::InvalidLocator(format!("invalid port {p:?}"))
            })?),
            None => None,
        };

        let query = match text("query") {
            Some(q) => parse_query(q)?,
            None => BTreeMap::new(),
        };

        let host = match text("ipv6host") {
            Some(v6) => Some(v6.to_string()),
            None => text("host").map(decode).transpose()?,
        };

        Ok(DatabaseLocator {
            dialect,
            driver: text("driver").map(str::to_string),
            username: text("username")
                .filter(|u| !u.is_empty())
                .map(decode)
                .transpose()?,
            password: text("password").map(decode).transpose()?,
            host: host.filter(|h| !h.is_empty()),
            port,
            database: text("database")
                .filter(|d| !d.is_empty())
                .map(decode)
                .transpose()?,
            query,
        })
    }
}

fn decode(raw: &str) -> Result<String, SqlCaddyError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| SqlCaddyError::InvalidLocator(format!("bad escape in {raw:?}: {e}")))
}

fn parse_query(raw: &str) -> Result<BTreeMap<String, String>, SqlCaddyError> {
    let mut out = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(decode(key)?, decode(value)?);
    }
    Ok(out)
}

pub(super) fn render(locator: &DatabaseLocator, mask_password: bool) -> String {
    let mut out = String::from(locator.dialect.name());
    if let Some(driver) = &locator.driver {
        out.push('+');
        out.push_str(driver);
    }
    out.push_str("://");

    if locator.username.is_some() || locator.password.is_some() {
        if let Some(user) = &locator.username {
            out.extend(utf8_percent_encode(user, USERINFO));
        }
        if let Some(password) = &locator.password {
            out.push(':');
            if mask_password {
                out.push_str("***");
            } else {
                out.extend(utf8_percent_encode(password, USERINFO));
            }
        }
        out.push('@');
    }

    if let Some(host) = &locator.host {
        if host.contains(':') {
            let _ = write!(out, "[{host}]");
        } else {
            out.extend(utf8_percent_encode(host, HOST));
        }
    }
    if let Some(port) = locator.port {
        let _ = write!(out, ":{port}");
    }
    if let Some(database) = &locator.database {
        out.push('/');
        out.extend(utf8_percent_encode(database, DATABASE));
    }

    if !locator.query.is_empty() {
        out.push('?');
        let pairs: Vec<String> = locator
            .query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY),
                    utf8_percent_encode(v, QUERY)
                )
            })
            .collect();
        out.push_str(&pairs.join("&"));
    }

    out
}
